//! # Ports Layer
//!
//! Interfaces between the engine and its external collaborators.
//!
//! - `outbound` - driven ports the engine depends on (Ledger, bytecode
//!   loader/interpreter)

pub mod outbound;

pub use outbound::*;
