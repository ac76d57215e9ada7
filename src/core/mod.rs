//! Core modules for the registry runtime.
//!
//! Storage primitives, the table layer, the admin gate, the invocation
//! router and the SQLite host binding all live here. Domain logic lives in
//! [`crate::plugins`].

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod identity;
pub mod router;
pub mod schemas;
pub mod store;
pub mod table;
pub mod time;
