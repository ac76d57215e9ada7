//! Invocation router: resolves an external operation name to a closed set of
//! operations, checks argument counts and dispatches to the proposal
//! registry.
//!
//! Two call kinds exist. `invoke` calls may mutate (`init`,
//! `registerProposal`); `query` calls are read-only (`queryProposal`,
//! `queryAllProposals`). A name is matched exactly and only within its own
//! kind.

use crate::core::error::{InitError, RegistryError, StoreError};
use crate::core::identity::Identity;
use crate::core::store::RecordStore;
use crate::plugins::proposal::{Proposal, ProposalRegistry, RegistrationOutcome};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Invoke,
    Query,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Invoke => f.write_str("invoke"),
            CallKind::Query => f.write_str("query"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    RegisterProposal,
    QueryProposal,
    QueryAllProposals,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Init,
        Operation::RegisterProposal,
        Operation::QueryProposal,
        Operation::QueryAllProposals,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::RegisterProposal => "registerProposal",
            Operation::QueryProposal => "queryProposal",
            Operation::QueryAllProposals => "queryAllProposals",
        }
    }

    pub fn kind(self) -> CallKind {
        match self {
            Operation::Init | Operation::RegisterProposal => CallKind::Invoke,
            Operation::QueryProposal | Operation::QueryAllProposals => CallKind::Query,
        }
    }

    /// Number of string arguments the operation takes.
    pub fn arity(self) -> usize {
        match self {
            Operation::Init | Operation::QueryAllProposals => 0,
            Operation::RegisterProposal => 5,
            Operation::QueryProposal => 1,
        }
    }

    pub fn resolve(kind: CallKind, name: &str) -> Result<Self, RegistryError> {
        Operation::ALL
            .into_iter()
            .find(|op| op.kind() == kind && op.name() == name)
            .ok_or_else(|| RegistryError::UnknownOperation {
                name: name.to_string(),
            })
    }

    fn check_arity(self, args: &[String]) -> Result<(), RegistryError> {
        if args.len() != self.arity() {
            return Err(RegistryError::ArgumentCount {
                operation: self.name(),
                expected: self.arity(),
                actual: args.len(),
            });
        }
        Ok(())
    }
}

/// One call as the host delivers it.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub kind: CallKind,
    pub function: &'a str,
    pub args: &'a [String],
    /// Caller identity from the host's call metadata, never from `args`.
    pub caller: Option<&'a Identity>,
}

/// A failed call. `payload` holds a result the operation still produced,
/// such as `{"registered":false}` for a duplicate proposal.
#[derive(Debug)]
pub struct Rejection {
    pub error: RegistryError,
    pub payload: Option<Vec<u8>>,
}

impl Rejection {
    pub fn with_payload(error: RegistryError, payload: Vec<u8>) -> Self {
        Self {
            error,
            payload: Some(payload),
        }
    }
}

impl From<RegistryError> for Rejection {
    fn from(error: RegistryError) -> Self {
        Self {
            error,
            payload: None,
        }
    }
}

impl From<InitError> for Rejection {
    fn from(error: InitError) -> Self {
        RegistryError::from(error).into()
    }
}

impl From<StoreError> for Rejection {
    fn from(error: StoreError) -> Self {
        RegistryError::from(error).into()
    }
}

impl From<serde_json::Error> for Rejection {
    fn from(error: serde_json::Error) -> Self {
        RegistryError::from(error).into()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

pub struct Router {
    registry: ProposalRegistry,
}

impl Router {
    pub fn new(registry: ProposalRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProposalRegistry {
        &self.registry
    }

    pub fn handle<S: RecordStore + ?Sized>(
        &mut self,
        store: &mut S,
        invocation: Invocation<'_>,
    ) -> Result<Vec<u8>, Rejection> {
        let op = Operation::resolve(invocation.kind, invocation.function)?;
        op.check_arity(invocation.args)?;
        debug!(kind = %invocation.kind, op = op.name(), "dispatching");

        match op {
            Operation::Init => {
                self.registry.init(store, invocation.caller)?;
                Ok(Vec::new())
            }
            Operation::RegisterProposal => {
                let proposal = Proposal::from_args(invocation.args)?;
                let outcome = self.registry.register_proposal(store, &proposal)?;
                let payload = serde_json::to_vec(&outcome.receipt())?;
                match outcome {
                    RegistrationOutcome::Created => Ok(payload),
                    RegistrationOutcome::AlreadyExists => Err(Rejection::with_payload(
                        RegistryError::AlreadyExists { id: proposal.id },
                        payload,
                    )),
                }
            }
            Operation::QueryProposal => {
                let proposal = self.registry.query_proposal(&*store, &invocation.args[0])?;
                Ok(serde_json::to_vec(&proposal)?)
            }
            Operation::QueryAllProposals => {
                let anonymous = Identity::anonymous();
                let caller = invocation.caller.unwrap_or(&anonymous);
                let proposals = self
                    .registry
                    .query_all_proposals(&*store, caller)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(serde_json::to_vec(&proposals)?)
            }
        }
    }
}
