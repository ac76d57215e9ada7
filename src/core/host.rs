//! SQLite-backed host binding.
//!
//! [`Host`] plays the role a ledger peer plays for the registry: it owns the
//! store root, hands each call a caller identity and runs the call in exactly
//! one transaction through the [`DbBroker`]. A failed `invoke` leaves no
//! trace in the database.

use crate::core::broker::{BrokerEvent, DbBroker};
use crate::core::config::{self, RegistryConfig};
use crate::core::db::{self, SqliteRecordStore};
use crate::core::error::RegistryError;
use crate::core::identity::Identity;
use crate::core::router::{CallKind, Invocation, Rejection, Router};
use crate::core::store::Store;
use crate::plugins::proposal::ProposalRegistry;
use std::fs;

pub struct Host {
    store: Store,
    config: RegistryConfig,
    broker: DbBroker,
    router: Router,
}

impl Host {
    /// Open (creating if needed) the registry under `store.root`.
    pub fn open(store: Store, config: RegistryConfig) -> Result<Self, RegistryError> {
        config.validate()?;
        fs::create_dir_all(&store.root)?;
        db::initialize_registry_db(&store.db_path(), config.busy_timeout_secs)?;

        let broker = DbBroker::new(&store, config.audit_log, config.busy_timeout_secs);
        let router = Router::new(ProposalRegistry::new(config.clone()));
        tracing::debug!(root = %store.root.display(), "registry host opened");

        Ok(Self {
            store,
            config,
            broker,
            router,
        })
    }

    /// Open with the configuration found in the store root.
    pub fn open_with_store_config(store: Store) -> Result<Self, RegistryError> {
        let config = config::load_config(&store.root)?;
        Self::open(store, config)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn invoke(
        &mut self,
        caller: Option<&Identity>,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, Rejection> {
        self.dispatch(CallKind::Invoke, caller, function, args)
    }

    pub fn query(
        &mut self,
        caller: Option<&Identity>,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, Rejection> {
        self.dispatch(CallKind::Query, caller, function, args)
    }

    pub fn audit_events(&self) -> Result<Vec<BrokerEvent>, RegistryError> {
        Ok(self.broker.read_audit_log()?)
    }

    fn dispatch(
        &mut self,
        kind: CallKind,
        caller: Option<&Identity>,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, Rejection> {
        let actor = caller.map_or_else(|| "anonymous".to_string(), Identity::fingerprint);
        let invocation = Invocation {
            kind,
            function,
            args,
            caller,
        };

        let router = &mut self.router;
        let result = self.broker.with_tx(&actor, kind, function, |tx| {
            let mut records = SqliteRecordStore::new(tx);
            router.handle(&mut records, invocation)
        });

        if let Err(rejection) = &result {
            tracing::debug!(op = function, code = rejection.error.code(), "call rejected");
        }
        result
    }
}
