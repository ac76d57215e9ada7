use propreg::core::config::RegistryConfig;
use propreg::core::error::RegistryError;
use propreg::core::identity::{ADMIN_KEY, BootstrapOutcome, Identity};
use propreg::core::router::{CallKind, Invocation, Rejection, Router};
use propreg::core::store::{MemoryRecordStore, RecordStore};
use propreg::plugins::proposal::{self, Proposal, ProposalRegistry, RegistrationOutcome};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn router() -> Router {
    Router::new(ProposalRegistry::new(RegistryConfig::default()))
}

fn call(
    router: &mut Router,
    store: &mut MemoryRecordStore,
    kind: CallKind,
    function: &str,
    call_args: &[String],
    caller: Option<&Identity>,
) -> Result<Vec<u8>, Rejection> {
    router.handle(
        store,
        Invocation {
            kind,
            function,
            args: call_args,
            caller,
        },
    )
}

fn init(router: &mut Router, store: &mut MemoryRecordStore, caller: &Identity) {
    call(router, store, CallKind::Invoke, "init", &[], Some(caller)).unwrap();
}

fn register(
    router: &mut Router,
    store: &mut MemoryRecordStore,
    fields: &[&str],
) -> Result<Vec<u8>, Rejection> {
    call(router, store, CallKind::Invoke, "registerProposal", &args(fields), None)
}

#[test]
fn test_register_then_query_scenario() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    let admin = Identity::from("admin-cert");
    init(&mut router, &mut store, &admin);

    let receipt = register(
        &mut router,
        &mut store,
        &["p1", "12345678900", "true", "false", "false"],
    )
    .unwrap();
    assert_eq!(receipt, br#"{"registered":true}"#);

    let payload = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryProposal",
        &args(&["p1"]),
        None,
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": "p1",
            "payerDocument": "12345678900",
            "payerAccepted": true,
            "beneficiaryAccepted": false,
            "paymentSettled": false
        })
    );

    let rejection = register(
        &mut router,
        &mut store,
        &["p1", "12345678900", "true", "false", "false"],
    )
    .unwrap_err();
    assert_eq!(rejection.payload.as_deref(), Some(&br#"{"registered":false}"#[..]));
    assert!(matches!(rejection.error, RegistryError::AlreadyExists { .. }));

    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryProposal",
        &args(&["missing"]),
        None,
    )
    .unwrap_err();
    assert!(matches!(rejection.error, RegistryError::NotFound { ref id } if id == "missing"));
}

#[test]
fn test_duplicate_registration_keeps_first_record() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    init(&mut router, &mut store, &Identity::from("admin"));

    register(&mut router, &mut store, &["p1", "first", "true", "true", "true"]).unwrap();
    let rejection = register(
        &mut router,
        &mut store,
        &["p1", "second", "false", "false", "false"],
    )
    .unwrap_err();

    assert!(matches!(rejection.error, RegistryError::AlreadyExists { ref id } if id == "p1"));
    assert_eq!(rejection.error.code(), "DUPLICATE_KEY");
    assert_eq!(rejection.payload.as_deref(), Some(&br#"{"registered":false}"#[..]));

    let stored = router
        .registry()
        .query_proposal(&store, "p1")
        .unwrap();
    assert_eq!(stored.payer_document, "first");
    assert!(stored.payment_settled);
}

#[test]
fn test_query_all_is_admin_only() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    let admin = Identity::from("admin-cert");
    init(&mut router, &mut store, &admin);

    for id in ["b", "a", "c"] {
        register(&mut router, &mut store, &[id, "doc", "false", "false", "false"]).unwrap();
    }

    let payload = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryAllProposals",
        &[],
        Some(&admin),
    )
    .unwrap();
    let all: Vec<Proposal> = serde_json::from_slice(&payload).unwrap();
    let ids: Vec<_> = all.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);

    let intruder = Identity::from("someone-else");
    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryAllProposals",
        &[],
        Some(&intruder),
    )
    .unwrap_err();
    assert_eq!(rejection.error.code(), "UNAUTHORIZED");
    assert!(rejection.payload.is_none());

    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryAllProposals",
        &[],
        None,
    )
    .unwrap_err();
    assert_eq!(rejection.error.code(), "UNAUTHORIZED");
}

#[test]
fn test_admin_is_pinned_after_first_init() {
    let mut store = MemoryRecordStore::new();
    let registry = ProposalRegistry::new(RegistryConfig::default());
    let admin = Identity::from("first");

    let report = registry.init(&mut store, Some(&admin)).unwrap();
    assert_eq!(report.admin, Some(BootstrapOutcome::Bootstrapped));
    assert!(!report.table_reset);

    let p = Proposal::from_args(&args(&["p1", "doc", "true", "true", "true"])).unwrap();
    assert_eq!(
        registry.register_proposal(&mut store, &p).unwrap(),
        RegistrationOutcome::Created
    );

    // A different caller cannot take over or wipe the table.
    assert!(registry
        .init(&mut store, Some(&Identity::from("second")))
        .is_err());
    assert_eq!(store.get(ADMIN_KEY).unwrap(), Some(b"first".to_vec()));
    assert!(registry.query_proposal(&store, "p1").is_ok());

    // The admin itself may reset.
    let report = registry.init(&mut store, Some(&admin)).unwrap();
    assert_eq!(report.admin, Some(BootstrapOutcome::AlreadyAdmin));
    assert!(report.table_reset);
    assert!(matches!(
        registry.query_proposal(&store, "p1"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[test]
fn test_init_requires_identity_by_default() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    let rejection = call(&mut router, &mut store, CallKind::Invoke, "init", &[], None).unwrap_err();
    assert_eq!(rejection.error.code(), "MISSING_ADMIN_IDENTITY");
    assert!(store.is_empty());
}

#[test]
fn test_operations_before_init_fail() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();

    let rejection =
        register(&mut router, &mut store, &["p1", "doc", "true", "true", "true"]).unwrap_err();
    assert_eq!(rejection.error.code(), "STORE_ERROR");

    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryProposal",
        &args(&["p1"]),
        None,
    )
    .unwrap_err();
    assert_eq!(rejection.error.code(), "STORE_ERROR");

    let admin = Identity::from("admin");
    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryAllProposals",
        &[],
        Some(&admin),
    )
    .unwrap_err();
    assert_eq!(rejection.error.code(), "NOT_BOOTSTRAPPED");
}

#[test]
fn test_argument_validation() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    init(&mut router, &mut store, &Identity::from("admin"));

    let cases: [(&[&str], &str); 4] = [
        (&["p1", "doc", "true", "false"], "ARGUMENT_ERROR"),
        (&["p1", "doc", "yes", "false", "false"], "ARGUMENT_ERROR"),
        (&["p1", "doc", "true", "false", "TRUE"], "ARGUMENT_ERROR"),
        (&["", "doc", "true", "false", "false"], "ARGUMENT_ERROR"),
    ];
    for (fields, code) in cases {
        let rejection = register(&mut router, &mut store, fields).unwrap_err();
        assert_eq!(rejection.error.code(), code, "fields: {fields:?}");
    }

    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryProposal",
        &[],
        None,
    )
    .unwrap_err();
    assert!(matches!(
        rejection.error,
        RegistryError::ArgumentCount {
            expected: 1,
            actual: 0,
            ..
        }
    ));

    // Nothing partial was stored.
    assert!(matches!(
        router.registry().query_proposal(&store, "p1"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[test]
fn test_non_boolean_flag_names_field_and_stores_nothing() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();
    init(&mut router, &mut store, &Identity::from("admin"));

    let rejection =
        register(&mut router, &mut store, &["x", "y", "notabool", "false", "true"]).unwrap_err();
    assert!(
        matches!(
            rejection.error,
            RegistryError::InvalidArgument {
                field: "payerAccepted",
                ..
            }
        ),
        "got {:?}",
        rejection.error
    );
    assert!(rejection.payload.is_none());

    let rejection = call(
        &mut router,
        &mut store,
        CallKind::Query,
        "queryProposal",
        &args(&["x"]),
        None,
    )
    .unwrap_err();
    assert!(matches!(rejection.error, RegistryError::NotFound { ref id } if id == "x"));
}

#[test]
fn test_unknown_operations_are_rejected() {
    let mut store = MemoryRecordStore::new();
    let mut router = router();

    for (kind, name) in [
        (CallKind::Invoke, "deleteProposal"),
        (CallKind::Invoke, "queryProposal"),
        (CallKind::Query, "registerProposal"),
        (CallKind::Query, "dummy_query"),
    ] {
        let rejection = call(&mut router, &mut store, kind, name, &[], None).unwrap_err();
        assert_eq!(rejection.error.code(), "UNKNOWN_OPERATION");
        assert!(rejection.error.to_string().contains(name));
    }
    assert!(store.is_empty());
}

#[test]
fn test_query_all_streams_across_pages() {
    let mut store = MemoryRecordStore::new();
    let config = RegistryConfig {
        scan_page_size: 2,
        ..RegistryConfig::default()
    };
    let registry = ProposalRegistry::new(config);
    let admin = Identity::from("admin");
    registry.init(&mut store, Some(&admin)).unwrap();

    for i in 0..7 {
        let p = Proposal::from_args(&args(&[&format!("p{i}"), "doc", "true", "false", "true"]))
            .unwrap();
        registry.register_proposal(&mut store, &p).unwrap();
    }

    let mut scan = registry.query_all_proposals(&store, &admin).unwrap();
    assert_eq!(scan.next().unwrap().unwrap().id, "p0");
    let rest: Vec<_> = scan.map(|p| p.unwrap().id).collect();
    assert_eq!(rest, ["p1", "p2", "p3", "p4", "p5", "p6"]);
}

#[test]
fn test_schema_lists_operations() {
    let schema = proposal::schema();
    let names: BTreeSet<_> = schema["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(
        names,
        BTreeSet::from(["init", "queryAllProposals", "queryProposal", "registerProposal"])
    );
}

fn flag() -> impl Strategy<Value = bool> {
    any::<bool>()
}

proptest! {
    #[test]
    fn property_registered_proposal_reads_back_unchanged(
        id in "[A-Za-z0-9_./-]{1,24}",
        doc in ".{0,32}",
        payer in flag(),
        beneficiary in flag(),
        settled in flag(),
    ) {
        let mut store = MemoryRecordStore::new();
        let registry = ProposalRegistry::new(RegistryConfig::default());
        registry.init(&mut store, Some(&Identity::from("admin"))).unwrap();

        let proposal = Proposal::from_args(&[
            id.clone(),
            doc.clone(),
            payer.to_string(),
            beneficiary.to_string(),
            settled.to_string(),
        ])
        .unwrap();
        registry.register_proposal(&mut store, &proposal).unwrap();

        let read = registry.query_proposal(&store, &id).unwrap();
        prop_assert_eq!(read, proposal);
    }

    #[test]
    fn property_each_id_is_created_once(ids in proptest::collection::vec("[a-e]{1,2}", 0..40)) {
        let mut store = MemoryRecordStore::new();
        let registry = ProposalRegistry::new(RegistryConfig {
            scan_page_size: 3,
            ..RegistryConfig::default()
        });
        let admin = Identity::from("admin");
        registry.init(&mut store, Some(&admin)).unwrap();

        let mut seen = BTreeSet::new();
        for (n, id) in ids.iter().enumerate() {
            let proposal = Proposal {
                id: id.clone(),
                payer_document: format!("doc-{n}"),
                payer_accepted: false,
                beneficiary_accepted: false,
                payment_settled: false,
            };
            let outcome = registry.register_proposal(&mut store, &proposal).unwrap();
            prop_assert_eq!(outcome.registered(), seen.insert(id.clone()));
        }

        let all: Vec<_> = registry
            .query_all_proposals(&store, &admin)
            .unwrap()
            .map(|p| p.unwrap().id)
            .collect();
        let expected: Vec<_> = seen.into_iter().collect();
        prop_assert_eq!(all, expected);
    }
}
