//! # Execution Core
//!
//! The engine and its supporting machinery:
//!
//! - `memory` - per-app linear memory with a C-style arena allocator
//! - `app` - one loaded contract (code + linked instance + memory)
//! - `overlay` - buffered per-frame state views
//! - `deploy` - deployment payload framing
//! - `engine` - frame stack, gas accounting, host-call dispatch

pub mod app;
pub mod deploy;
pub mod engine;
pub mod memory;
pub mod overlay;

pub use app::App;
pub use engine::{CallEnv, Engine};
pub use memory::LinearMemory;
pub use overlay::StateOverlay;
