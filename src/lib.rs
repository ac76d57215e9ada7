//! propreg: a transactional proposal registry.
//!
//! The registry keeps create-once proposal records (a payer document plus
//! three settlement flags) in a keyed record store, guards the bulk query
//! behind an administrator identity bootstrapped on first `init`, and routes
//! named operations with string arguments the way a ledger host delivers
//! them.
//!
//! # Architecture
//!
//! ## Record store
//!
//! All state goes through [`crate::core::store::RecordStore`]. The crate ships an
//! in-memory store and a SQLite-backed one; the table layer
//! ([`crate::core::table`]) lays schemas and rows out on top of it.
//!
//! ## The Thin Waist
//!
//! Every call from the CLI goes through [`crate::core::host::Host`], which runs it
//! in one SQLite transaction via `DbBroker`:
//! - Serialization (in-process lock plus SQLite busy timeout)
//! - Commit on success, rollback on any failure
//! - Audit logging (`broker.events.jsonl`)
//!
//! # Examples
//!
//! ```bash
//! propreg --caller admin-cert init
//! propreg invoke registerProposal p1 12345678900 true false false
//! propreg query queryProposal p1
//! propreg --caller admin-cert query queryAllProposals
//! ```
//!
//! # Crate Structure
//!
//! - [`core`](crate::core): store, tables, identity gate, router, host binding
//! - [`plugins`]: the proposal registry

pub mod core;
pub mod plugins;

use crate::core::{
    broker,
    error::RegistryError,
    host::Host,
    identity::Identity,
    router::{CallKind, Operation, Rejection},
    store::Store,
    time,
};
use crate::plugins::proposal;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const STORE_ENV: &str = "PROPREG_STORE";
pub const CALLER_ENV: &str = "PROPREG_CALLER";
const DEFAULT_STORE_DIR: &str = ".propreg/data";

#[derive(Parser, Debug)]
#[clap(
    name = "propreg",
    version = env!("CARGO_PKG_VERSION"),
    about = "Transactional proposal registry"
)]
struct Cli {
    /// Store root (defaults to $PROPREG_STORE, then ./.propreg/data).
    #[clap(long, global = true)]
    store: Option<PathBuf>,
    /// Caller identity token (defaults to $PROPREG_CALLER).
    #[clap(long, global = true)]
    caller: Option<String>,
    /// Debug logging on stderr.
    #[clap(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the administrator and reset the proposal table
    Init,

    /// Run a state-changing operation
    Invoke {
        /// Operation name, e.g. registerProposal
        function: String,
        args: Vec<String>,
    },

    /// Run a read-only operation
    Query {
        /// Operation name, e.g. queryProposal
        function: String,
        args: Vec<String>,
    },

    /// Show the call audit log
    Audit,

    /// Print the operation surface as JSON
    Schema,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "propreg=debug" } else { "propreg=info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .try_init();
}

fn resolve_store(flag: Option<PathBuf>) -> Store {
    let root = flag
        .or_else(|| std::env::var_os(STORE_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
    Store::new(root)
}

/// An empty token is passed through as given; the identity gate rejects it.
fn resolve_caller(flag: Option<String>) -> Option<Identity> {
    flag.or_else(|| std::env::var(CALLER_ENV).ok())
        .map(Identity::from)
}

fn schema_document() -> serde_json::Value {
    let operations: Vec<_> = Operation::ALL
        .iter()
        .map(|op| {
            serde_json::json!({
                "name": op.name(),
                "kind": op.kind().to_string(),
                "arity": op.arity(),
            })
        })
        .collect();
    serde_json::json!({
        "schema_version": "1.0.0",
        "operations": operations,
        "subsystems": {
            "proposal": proposal::schema(),
            "broker": broker::schema(),
        }
    })
}

fn print_payload(payload: &[u8]) {
    if !payload.is_empty() {
        println!("{}", String::from_utf8_lossy(payload));
    }
}

/// Print the error envelope on stdout and hand the error back for exit 1.
fn report_rejection(function: &str, rejection: Rejection) -> RegistryError {
    let result = rejection
        .payload
        .as_deref()
        .and_then(|bytes| serde_json::from_slice(bytes).ok());
    let envelope = time::error_envelope(
        function,
        rejection.error.code(),
        &rejection.error.to_string(),
        result,
    );
    println!("{}", envelope);
    rejection.error
}

fn run_call(
    host: &mut Host,
    kind: CallKind,
    caller: Option<&Identity>,
    function: &str,
    args: &[String],
) -> Result<(), RegistryError> {
    let outcome = match kind {
        CallKind::Invoke => host.invoke(caller, function, args),
        CallKind::Query => host.query(caller, function, args),
    };
    match outcome {
        Ok(payload) => {
            print_payload(&payload);
            Ok(())
        }
        Err(rejection) => Err(report_rejection(function, rejection)),
    }
}

pub fn run() -> Result<(), RegistryError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Schema = cli.command {
        println!("{}", serde_json::to_string_pretty(&schema_document())?);
        return Ok(());
    }

    let store = resolve_store(cli.store);
    let caller = resolve_caller(cli.caller);
    let mut host = Host::open_with_store_config(store)?;

    match cli.command {
        Command::Init => {
            run_call(&mut host, CallKind::Invoke, caller.as_ref(), "init", &[])?;
            use colored::Colorize;
            eprintln!(
                "{} registry initialized at {}",
                "ok:".green().bold(),
                host.store().root.display()
            );
        }
        Command::Invoke { function, args } => {
            run_call(&mut host, CallKind::Invoke, caller.as_ref(), &function, &args)?;
        }
        Command::Query { function, args } => {
            run_call(&mut host, CallKind::Query, caller.as_ref(), &function, &args)?;
        }
        Command::Audit => {
            let events = host.audit_events()?;
            if events.is_empty() {
                eprintln!("No audit log found.");
            }
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Command::Schema => {}
    }
    Ok(())
}
