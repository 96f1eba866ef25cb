//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the execution engine depends on. External adapters implement
//! these traits to provide:
//! - The Ledger (account balances, code storage, event log, destruction
//!   markers)
//! - The bytecode loader/interpreter (module instantiation and entry-point
//!   dispatch)
//!
//! Dependencies point INWARD: adapters implement these traits, the engine
//! consumes them. All operations are synchronous; a host capability blocks
//! until its effect completes.

use crate::domain::entities::LogEntry;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::{LoadError, StateError, VmError};

// =============================================================================
// LEDGER
// =============================================================================

/// The account/state/log store the engine reads and mutates.
///
/// All operations are keyed by the fixed-width [`Address`] type. Mutators
/// take `&self`; implementations use interior mutability so one ledger
/// handle can be shared across nested frames.
pub trait Ledger: Send + Sync {
    /// Returns the code stored at `address` (empty if none).
    fn get_code(&self, address: Address) -> Result<Bytes, StateError>;

    /// Stores `code` at `address`.
    fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Returns the balance of `address` (zero if the account is unknown).
    fn get_balance(&self, address: Address) -> Result<U256, StateError>;

    /// Adds `amount` to the balance of `address`.
    fn add_balance(&self, address: Address, amount: U256) -> Result<(), StateError>;

    /// Subtracts `amount` from the balance of `address`.
    ///
    /// # Errors
    ///
    /// `StateError::InsufficientBalance` if the balance is smaller than
    /// `amount`.
    fn sub_balance(&self, address: Address, amount: U256) -> Result<(), StateError>;

    /// Appends an event log entry.
    fn append_log(&self, entry: LogEntry) -> Result<(), StateError>;

    /// Returns all event log entries visible at this view.
    fn logs(&self) -> Result<Vec<LogEntry>, StateError>;

    /// Marks `address` as self-destructed with its balance beneficiary.
    fn mark_destroyed(&self, address: Address, beneficiary: Address) -> Result<(), StateError>;

    /// Returns true if `address` has been marked destroyed.
    fn is_destroyed(&self, address: Address) -> Result<bool, StateError>;
}

// =============================================================================
// IMPORT MODULE DESCRIPTION
// =============================================================================

/// A host-exported global binding: a name and its constant 64-bit value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportGlobal {
    /// Import name within the namespace.
    pub name: String,
    /// The bound value.
    pub value: u64,
}

/// Synthetic import module handed to the bytecode loader at link time.
///
/// Describes the host namespace: the function table (every registered
/// capability name with its stable ordinal index) plus the global table,
/// which may be empty.
#[derive(Clone, Debug)]
pub struct ImportModule {
    /// The reserved host namespace (always `"env"`).
    pub namespace: String,
    /// Function names in registration order; position == ordinal index.
    pub functions: Vec<String>,
    /// Global bindings offered alongside the functions.
    pub globals: Vec<ImportGlobal>,
}

impl ImportModule {
    /// Returns the ordinal index of a named function import, if registered.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.functions
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    /// Returns true if the named function import is available.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns the value bound to a named global, if offered.
    #[must_use]
    pub fn global_of(&self, name: &str) -> Option<u64> {
        self.globals.iter().find(|g| g.name == name).map(|g| g.value)
    }
}

// =============================================================================
// BYTECODE LOADER / INTERPRETER
// =============================================================================

/// The bytecode decoder/interpreter, consumed as an opaque service.
///
/// Accepts a module byte stream plus the host import description; returns
/// an executable module or a structural-validity error. Import resolution
/// happens here: a module referencing a capability name absent from
/// `imports` fails at link time, before any gas is charged.
pub trait ModuleLoader: Send + Sync {
    /// Loads and links a module.
    fn load(&self, code: &[u8], imports: &ImportModule)
        -> Result<Box<dyn ModuleInstance>, LoadError>;
}

/// One loaded, linked module, ready to execute exported entry points.
///
/// Instances hold no per-invocation state of their own; all mutable state
/// lives in the owning App's linear memory, so `invoke` takes `&self` and
/// nested re-entry into the same instance is permitted.
pub trait ModuleInstance: Send + Sync {
    /// Returns true if the module exports an entry point with this name.
    fn has_export(&self, name: &str) -> bool;

    /// Calls an exported function with a flat vector of 64-bit words.
    ///
    /// While executing, the module issues host calls through `host`;
    /// each is priced and charged by the engine before it runs.
    fn invoke(
        &self,
        entry: &str,
        args: &[u64],
        host: &mut dyn HostDispatch,
    ) -> Result<u64, VmError>;
}

impl core::fmt::Debug for dyn ModuleInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ModuleInstance")
    }
}

/// The engine-side surface a running module uses: host-function dispatch
/// plus read/write access to its own linear memory at offset/length.
pub trait HostDispatch {
    /// Invokes the host capability at `index` with a flat argument vector.
    ///
    /// The engine charges the capability's gas price before execution;
    /// if the charge exceeds the remaining budget the capability does not
    /// run and `VmError::OutOfGas` is returned.
    fn call_host(&mut self, index: u32, args: &[u64]) -> Result<u64, VmError>;

    /// Resolves a capability name to its ordinal index.
    fn host_index(&self, name: &str) -> Option<u32>;

    /// Reads from the current app's linear memory.
    fn read_memory(&self, offset: u64, len: u64) -> Result<Vec<u8>, VmError>;

    /// Writes into the current app's linear memory.
    fn write_memory(&mut self, offset: u64, data: &[u8]) -> Result<(), VmError>;
}

// =============================================================================
// TESTS
// =============================================================================
