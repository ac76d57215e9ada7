use crate::core::identity::Identity;
use std::io;
use thiserror::Error;

/// Failures of the record store and the table layer above it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),
    #[error("No row with key '{key}' in table '{table}'")]
    NotFound { table: String, key: String },
    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },
    #[error("Row does not match schema of table '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },
    #[error("Corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid admin identity. Empty.")]
    EmptyIdentity,
    #[error(
        "The caller does not have the rights to invoke this operation. Expected [{}], caller [{}]",
        .expected.fingerprint(),
        .actual.fingerprint()
    )]
    Unauthorized { expected: Identity, actual: Identity },
    #[error("No administrator has been bootstrapped")]
    NotBootstrapped,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum InitError {
    #[error("Initialization requires the caller's admin identity")]
    MissingAdminIdentity,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Incorrect number of arguments for '{operation}'. Expecting {expected}, got {actual}")]
    ArgumentCount {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("Proposal '{id}' already exists")]
    AlreadyExists { id: String },
    #[error("Proposal '{id}' not found")]
    NotFound { id: String },
    #[error("Received unknown function: {name}")]
    UnknownOperation { name: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Coarse error taxonomy used by callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Store,
    DuplicateKey,
    NotFound,
    Auth,
    Config,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::ArgumentCount { .. }
            | RegistryError::InvalidArgument { .. }
            | RegistryError::UnknownOperation { .. } => ErrorKind::Argument,
            RegistryError::AlreadyExists { .. } => ErrorKind::DuplicateKey,
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::Auth(AuthError::Store(_)) => ErrorKind::Store,
            RegistryError::Auth(_) => ErrorKind::Auth,
            RegistryError::Init(InitError::Store(_))
            | RegistryError::Init(InitError::Auth(AuthError::Store(_))) => ErrorKind::Store,
            RegistryError::Init(_) => ErrorKind::Auth,
            RegistryError::Store(_)
            | RegistryError::Serialization(_)
            | RegistryError::IoError(_) => ErrorKind::Store,
            RegistryError::Config(_) => ErrorKind::Config,
        }
    }

    /// Stable code for JSON envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            RegistryError::Auth(AuthError::Unauthorized { .. })
            | RegistryError::Init(InitError::Auth(AuthError::Unauthorized { .. })) => {
                "UNAUTHORIZED"
            }
            RegistryError::Auth(AuthError::NotBootstrapped) => "NOT_BOOTSTRAPPED",
            RegistryError::Auth(AuthError::EmptyIdentity)
            | RegistryError::Init(InitError::Auth(AuthError::EmptyIdentity)) => "EMPTY_IDENTITY",
            RegistryError::Init(InitError::MissingAdminIdentity) => "MISSING_ADMIN_IDENTITY",
            _ => match self.kind() {
                ErrorKind::Argument => "ARGUMENT_ERROR",
                ErrorKind::Store => "STORE_ERROR",
                ErrorKind::DuplicateKey => "DUPLICATE_KEY",
                ErrorKind::NotFound => "NOT_FOUND",
                ErrorKind::Auth => "AUTH_ERROR",
                ErrorKind::Config => "CONFIG_ERROR",
            },
        }
    }
}
