//! # Domain Layer (Inner Hexagon)
//!
//! Pure business logic for contract execution.
//! NO I/O, NO async, NO external state.
//!
//! All types here are pure domain concepts; adapters and the execution
//! core depend on this layer, never the other way around.

pub mod entities;
pub mod invariants;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
