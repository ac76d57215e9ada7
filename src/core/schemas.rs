//! Database schema and file names for the registry store.
//!
//! The registry keeps a single SQLite database with one flat `records` table.
//! All typed structure (tables, rows, the admin identity) is layered on top by
//! `core::table` and `core::identity`; SQLite only sees keys and blobs.

pub const REGISTRY_DB_NAME: &str = "registry.db";
pub const AUDIT_LOG_NAME: &str = "broker.events.jsonl";
pub const CONFIG_FILE_NAME: &str = "registry.toml";

pub const RECORDS_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL
    ) WITHOUT ROWID
";
