use crate::core::db;
use crate::core::error::StoreError;
use crate::core::router::CallKind;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// The DB Broker is the thin waist for registry state access.
///
/// Every host call goes through [`DbBroker::with_tx`]: one connection, one
/// transaction, one audit event. `invoke` calls take the write lock up front
/// and commit only on success; `query` calls always roll back.
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: Option<PathBuf>,
    busy_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    /// Caller fingerprint, or `anonymous`.
    pub actor: String,
    pub kind: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(store: &Store, audit: bool, busy_timeout_secs: u64) -> Self {
        Self {
            db_path: store.db_path(),
            audit_log_path: audit.then(|| store.audit_log_path()),
            busy_timeout_secs,
        }
    }

    /// Run `f` inside one transaction on the registry database.
    pub fn with_tx<F, R, E>(&self, actor: &str, kind: CallKind, op_name: &str, f: F) -> Result<R, E>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        // In-process serialization; SQLite's busy timeout covers other processes.
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut conn = db::db_connect(&self.db_path, self.busy_timeout_secs)?;
        let behavior = match kind {
            CallKind::Invoke => TransactionBehavior::Immediate,
            CallKind::Query => TransactionBehavior::Deferred,
        };
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(StoreError::from)?;

        let result = f(&tx);

        let status = match (&result, kind) {
            (Ok(_), CallKind::Invoke) => {
                tx.commit().map_err(StoreError::from)?;
                "committed"
            }
            (Ok(_), CallKind::Query) => {
                tx.rollback().map_err(StoreError::from)?;
                "success"
            }
            (Err(_), _) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!(error = %e, op = op_name, "rollback failed");
                }
                "rolled_back"
            }
        };
        tracing::debug!(actor, %kind, op = op_name, status, "call finished");

        if let Err(e) = self.log_event(actor, kind, op_name, status) {
            // The transaction outcome is already final at this point.
            tracing::warn!(error = %e, "failed to append audit event");
        }

        result
    }

    fn db_id(&self) -> String {
        self.db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    fn log_event(&self, actor: &str, kind: CallKind, op: &str, status: &str) -> Result<(), StoreError> {
        let Some(path) = &self.audit_log_path else {
            return Ok(());
        };

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            kind: kind.to_string(),
            op: op.to_string(),
            db_id: self.db_id(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)?;
        Ok(())
    }

    /// Every event in the audit log, oldest first. Empty when auditing is off
    /// or nothing was logged yet.
    pub fn read_audit_log(&self) -> Result<Vec<BrokerEvent>, StoreError> {
        let Some(path) = &self.audit_log_path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                    key: format!("{}:{}", path.display(), n + 1),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "broker",
        "version": "0.1.0",
        "description": "Per-call transaction broker with an append-only audit log",
        "commands": [
            { "name": "audit", "description": "Show the call audit log" }
        ],
        "storage": ["broker.events.jsonl"]
    })
}
