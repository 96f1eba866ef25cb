//! # Contract Engine - Sandboxed Bytecode Execution
//!
//! A sandboxed execution engine for smart-contract bytecode: contracts run
//! against a registry of named host capabilities, every capability is gas
//! metered, and all state effects flow through per-frame buffered views
//! that commit transactionally.
//!
//! ## Purpose
//!
//! Executes untrusted contract modules deterministically. A module links
//! against the reserved `"env"` namespace of host functions (memory and
//! string utilities, 256-bit arithmetic, crypto digests, JSON documents,
//! message/context queries, control flow, and chain interaction); the
//! engine prices every host call before it runs and charges it against a
//! single run-wide gas budget shared by all nested frames.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Gas Ceiling | `domain/invariants.rs` - `check_gas_ceiling()` |
//! | INVARIANT-2 | Deterministic Pricing | `env/gas_table.rs` - pure cost functions |
//! | INVARIANT-3 | Frame Atomicity | `vm/overlay.rs` - commit-or-discard views |
//! | INVARIANT-4 | Call Depth Limit | `domain/invariants.rs` - `check_call_depth()` |
//!
//! ## Execution Safety Limits
//!
//! | Limit | Default | Purpose |
//! |-------|---------|---------|
//! | `max_call_depth` | 1024 | Prevent stack overflow |
//! | `max_code_size` | 1 MB | Limit module size |
//! | `initial_memory_size` | 64 KB | Starting linear memory per app |
//! | `max_memory_size` | 16 MB | Memory growth limit |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Engine | `vm/engine.rs` | Frame stack, gas, host dispatch |
//! | App | `vm/app.rs` | Loaded contract + linear memory |
//! | Linear memory | `vm/memory.rs` | Bounds-checked arena allocator |
//! | State overlay | `vm/overlay.rs` | Buffered per-frame ledger views |
//! | Capability registry | `env/mod.rs` | Named host functions + pricing |
//! | Deploy framing | `vm/deploy.rs` | Init-args/code payload codec |
//!
//! ## Usage Example
//!
//! ```ignore
//! use contract_engine::prelude::*;
//!
//! let mut engine = Engine::new(message, context, ledger, loader, env, config)?;
//! let app = engine.new_app(address, false)?;
//!
//! let result = engine.run_report(&app, b"transfer|{\"to\":\"0x..\",\"amount\":\"10\"}");
//! if result.success() {
//!     println!("ret: {}, gas used: {}", result.ret, result.gas_used);
//! }
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod env;
pub mod errors;
pub mod ports;
pub mod vm;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        Context, EngineConfig, ExecutionResult, LogEntry, Message, RunState,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, GasCounter, Hash, U256};

    // Domain services
    pub use crate::domain::services::{ecrecover, keccak256, ripemd160, sha256};

    // Invariants
    pub use crate::domain::invariants::{
        check_call_depth, check_frame_invariants, check_gas_ceiling, InvariantCheckResult,
        InvariantViolation,
    };

    // Errors
    pub use crate::errors::{LoadError, StateError, VmError};

    // Capability registry
    pub use crate::env::{EnvTable, HostFunc, ENV_NAMESPACE};

    // Execution core
    pub use crate::vm::deploy::{self, DeployPayload};
    pub use crate::vm::{App, CallEnv, Engine, StateOverlay};

    // Ports
    pub use crate::ports::outbound::{
        HostDispatch, ImportGlobal, ImportModule, Ledger, ModuleInstance, ModuleLoader,
    };

    // Adapters
    pub use crate::adapters::{InMemoryLedger, ScriptLoader, ScriptModule};
}
