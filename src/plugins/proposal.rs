//! Proposal registry: create-once proposal records plus an admin-gated bulk
//! query.
//!
//! A proposal tracks one payer/beneficiary agreement and its settlement
//! flags. Proposals are only ever created; the registry has no update or
//! delete path. All durable state lives in the record store handed in per
//! call, the registry itself only holds the [`IdentityGate`].

use crate::core::config::RegistryConfig;
use crate::core::error::{InitError, RegistryError, StoreError};
use crate::core::identity::{BootstrapOutcome, Identity, IdentityGate};
use crate::core::store::RecordStore;
use crate::core::table::{self, ColumnDefinition, ColumnType, Row, RowScan, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const PROPOSAL_TABLE: &str = "Proposal";

/// Argument names of `registerProposal`, in wire order.
pub const REGISTER_ARGS: [&str; 5] = [
    "id",
    "payerDocument",
    "payerAccepted",
    "beneficiaryAccepted",
    "paymentSettled",
];

pub fn proposal_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("id", ColumnType::String, true),
        ColumnDefinition::new("payerDocument", ColumnType::String, false),
        ColumnDefinition::new("payerAccepted", ColumnType::Bool, false),
        ColumnDefinition::new("beneficiaryAccepted", ColumnType::Bool, false),
        ColumnDefinition::new("paymentSettled", ColumnType::Bool, false),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub payer_document: String,
    pub payer_accepted: bool,
    pub beneficiary_accepted: bool,
    pub payment_settled: bool,
}

impl Proposal {
    /// Parses the five `registerProposal` arguments. Flags must be exactly
    /// `"true"` or `"false"`.
    pub fn from_args(args: &[String]) -> Result<Self, RegistryError> {
        let [id, payer_document, payer_accepted, beneficiary_accepted, payment_settled] = args
        else {
            return Err(RegistryError::ArgumentCount {
                operation: "registerProposal",
                expected: REGISTER_ARGS.len(),
                actual: args.len(),
            });
        };

        if id.is_empty() {
            return Err(RegistryError::InvalidArgument {
                field: "id",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            id: id.clone(),
            payer_document: payer_document.clone(),
            payer_accepted: parse_flag("payerAccepted", payer_accepted)?,
            beneficiary_accepted: parse_flag("beneficiaryAccepted", beneficiary_accepted)?,
            payment_settled: parse_flag("paymentSettled", payment_settled)?,
        })
    }

    fn to_row(&self) -> Row {
        Row::new(vec![
            Value::String(self.id.clone()),
            Value::String(self.payer_document.clone()),
            Value::Bool(self.payer_accepted),
            Value::Bool(self.beneficiary_accepted),
            Value::Bool(self.payment_settled),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        match row.columns.as_slice() {
            [
                Value::String(id),
                Value::String(payer_document),
                Value::Bool(payer_accepted),
                Value::Bool(beneficiary_accepted),
                Value::Bool(payment_settled),
            ] => Ok(Self {
                id: id.clone(),
                payer_document: payer_document.clone(),
                payer_accepted: *payer_accepted,
                beneficiary_accepted: *beneficiary_accepted,
                payment_settled: *payment_settled,
            }),
            _ => Err(StoreError::SchemaMismatch {
                table: PROPOSAL_TABLE.to_string(),
                reason: "row does not have the proposal layout".to_string(),
            }),
        }
    }
}

fn parse_flag(field: &'static str, raw: &str) -> Result<bool, RegistryError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(RegistryError::InvalidArgument {
            field,
            reason: format!("expected \"true\" or \"false\", got {:?}", other),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    AlreadyExists,
}

impl RegistrationOutcome {
    pub fn registered(self) -> bool {
        self == RegistrationOutcome::Created
    }

    pub fn receipt(self) -> RegistrationReceipt {
        RegistrationReceipt {
            registered: self.registered(),
        }
    }
}

/// Caller-visible result of `registerProposal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub registered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// `None` when no caller identity was supplied.
    pub admin: Option<BootstrapOutcome>,
    /// A previous proposal table was dropped.
    pub table_reset: bool,
}

pub struct ProposalRegistry {
    gate: IdentityGate,
    config: RegistryConfig,
}

impl ProposalRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            gate: IdentityGate::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    /// Bootstraps (or re-checks) the admin, then recreates an empty proposal
    /// table. Once an admin exists only that admin can re-run it.
    pub fn init<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        caller: Option<&Identity>,
    ) -> Result<InitReport, InitError> {
        debug!("init registry");

        let admin = match caller {
            Some(caller) => Some(self.gate.bootstrap(store, caller)?),
            None => {
                if self.config.require_admin || self.gate.admin(&*store)?.is_some() {
                    return Err(InitError::MissingAdminIdentity);
                }
                None
            }
        };

        let table_reset = table::drop_table(store, PROPOSAL_TABLE)?;
        if table_reset {
            info!(table = PROPOSAL_TABLE, "dropped existing table");
        }
        table::create_table(store, PROPOSAL_TABLE, proposal_columns())?;
        info!(table = PROPOSAL_TABLE, "table created");

        Ok(InitReport { admin, table_reset })
    }

    pub fn register_proposal<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        proposal: &Proposal,
    ) -> Result<RegistrationOutcome, RegistryError> {
        debug!(id = %proposal.id, "registering proposal");
        if table::insert_row(store, PROPOSAL_TABLE, &proposal.to_row())? {
            info!(id = %proposal.id, "proposal created");
            Ok(RegistrationOutcome::Created)
        } else {
            debug!(id = %proposal.id, "proposal already exists");
            Ok(RegistrationOutcome::AlreadyExists)
        }
    }

    pub fn query_proposal<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        id: &str,
    ) -> Result<Proposal, RegistryError> {
        let row = table::get_row(store, PROPOSAL_TABLE, id).map_err(|e| match e {
            StoreError::NotFound { key, .. } => RegistryError::NotFound { id: key },
            other => RegistryError::Store(other),
        })?;
        Ok(Proposal::from_row(&row)?)
    }

    /// Admin only. Returns a one-pass iterator over every stored proposal.
    pub fn query_all_proposals<'s, S: RecordStore + ?Sized>(
        &self,
        store: &'s S,
        caller: &Identity,
    ) -> Result<ProposalScan<'s, S>, RegistryError> {
        self.gate.authorize(store, caller)?;
        let rows = table::scan_all(store, PROPOSAL_TABLE, self.config.scan_page_size)?;
        Ok(ProposalScan { rows })
    }
}

/// Lazy sequence of proposals from one table scan.
pub struct ProposalScan<'s, S: RecordStore + ?Sized> {
    rows: RowScan<'s, S>,
}

impl<S: RecordStore + ?Sized> Iterator for ProposalScan<'_, S> {
    type Item = Result<Proposal, RegistryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(
            row.and_then(|r| Proposal::from_row(&r))
                .map_err(RegistryError::from),
        )
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "proposal",
        "version": "0.1.0",
        "description": "Create-once proposal records with an admin-gated bulk query",
        "commands": [
            { "name": "init", "kind": "invoke", "parameters": [] },
            { "name": "registerProposal", "kind": "invoke", "parameters": REGISTER_ARGS },
            { "name": "queryProposal", "kind": "query", "parameters": ["id"] },
            { "name": "queryAllProposals", "kind": "query", "parameters": [], "privileged": true }
        ],
        "storage": ["registry.db"]
    })
}
