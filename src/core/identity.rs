//! Caller identities and the admin gate.
//!
//! The host hands every call an opaque identity token (a certificate, a
//! role attribute, a user name; the registry never parses it). One token is
//! recorded as the administrator the first time the registry is initialized
//! and privileged operations compare the current caller against it.
//!
//! The admin token lives in the record store under [`ADMIN_KEY`] and is only
//! ever written with `insert_if_absent`, so two first-time bootstraps cannot
//! overwrite each other. [`IdentityGate`] keeps no copy of it: every check
//! reads the store it is handed, so the answer always follows that store's
//! durable state, including after a rollback.

use crate::core::error::{AuthError, StoreError};
use crate::core::store::RecordStore;
use sha2::{Digest, Sha256};
use std::fmt;

/// Reserved record key for the admin token. Never a table row key.
pub const ADMIN_KEY: &str = "sys/admin";

/// Opaque caller identity. Compared byte for byte.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity(Vec<u8>);

impl Identity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Identity used when the host supplied none.
    pub fn anonymous() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short SHA-256 fingerprint, safe to put in logs and audit records.
    pub fn fingerprint(&self) -> String {
        if self.0.is_empty() {
            return "anonymous".to_string();
        }
        let digest = Sha256::digest(&self.0);
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.chars().any(char::is_control) => f.write_str(s),
            _ => {
                for b in &self.0 {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.fingerprint())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The caller was recorded as administrator.
    Bootstrapped,
    /// The caller already is the administrator; nothing was written.
    AlreadyAdmin,
}

/// Owner of the admin identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityGate;

impl IdentityGate {
    pub fn new() -> Self {
        Self
    }

    /// Current admin identity of `store`, if one was ever bootstrapped.
    pub fn admin<S: RecordStore + ?Sized>(&self, store: &S) -> Result<Option<Identity>, StoreError> {
        match store.get(ADMIN_KEY)? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(Identity::new(bytes))),
            _ => Ok(None),
        }
    }

    /// Records `caller` as administrator if none exists yet. When an admin
    /// already exists only that same identity passes.
    pub fn bootstrap<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        caller: &Identity,
    ) -> Result<BootstrapOutcome, AuthError> {
        if caller.is_empty() {
            return Err(AuthError::EmptyIdentity);
        }

        if store.insert_if_absent(ADMIN_KEY, caller.as_bytes())? {
            tracing::info!(admin = %caller.fingerprint(), "administrator bootstrapped");
            return Ok(BootstrapOutcome::Bootstrapped);
        }

        match self.admin(&*store)? {
            Some(admin) if &admin == caller => Ok(BootstrapOutcome::AlreadyAdmin),
            Some(admin) => {
                tracing::warn!(
                    admin = %admin.fingerprint(),
                    caller = %caller.fingerprint(),
                    "rejected bootstrap by non-admin caller"
                );
                Err(AuthError::Unauthorized {
                    expected: admin,
                    actual: caller.clone(),
                })
            }
            None => Err(AuthError::Store(StoreError::Corrupt {
                key: ADMIN_KEY.to_string(),
                reason: "admin record present but empty".to_string(),
            })),
        }
    }

    /// Passes only when `caller` is exactly the bootstrapped admin.
    pub fn authorize<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        caller: &Identity,
    ) -> Result<(), AuthError> {
        let admin = self.admin(store)?.ok_or(AuthError::NotBootstrapped)?;
        if &admin != caller {
            tracing::debug!(
                admin = %admin.fingerprint(),
                caller = %caller.fingerprint(),
                "caller is not admin"
            );
            return Err(AuthError::Unauthorized {
                expected: admin,
                actual: caller.clone(),
            });
        }
        Ok(())
    }
}
