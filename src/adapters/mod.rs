//! # Adapters Layer
//!
//! Implementations of the outbound ports:
//!
//! - `ledger` - thread-safe in-memory account/state/log store
//! - `script_loader` - programmable module loader for embedding and tests

pub mod ledger;
pub mod script_loader;

pub use ledger::InMemoryLedger;
pub use script_loader::{ScriptLoader, ScriptModule};
