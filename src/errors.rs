//! # Error Types
//!
//! All error types for contract execution and module loading.

use crate::domain::value_objects::{Address, U256};
use thiserror::Error;

// =============================================================================
// VM ERRORS
// =============================================================================

/// Errors that can occur while executing a contract run.
///
/// Every host capability resolves its faults to one of these variants;
/// no panic crosses the capability boundary.
#[derive(Debug, Error, Clone)]
pub enum VmError {
    /// Execution ran out of gas. The current frame's state effects are
    /// discarded; gas already consumed stays spent.
    #[error("out of gas")]
    OutOfGas,

    /// Explicit revert (`TC_Revert`, failed `TC_Assert`/`TC_Require`).
    #[error("revert: {0}")]
    Revert(String),

    /// Deliberate termination via `exit(code)`. The current frame commits.
    #[error("exit with code {0}")]
    Exit(u64),

    /// Deliberate termination via `abort()`. The current frame does not
    /// commit; already-committed outer frames stay committed.
    #[error("abort")]
    Abort,

    /// A memory access fell outside the app's live linear memory.
    #[error("memory fault: offset {offset}, len {len}")]
    MemoryFault { offset: u64, len: u64 },

    /// Linear memory growth would exceed the configured ceiling.
    #[error("memory limit exceeded: {requested} > {max} bytes")]
    MemoryLimitExceeded { requested: u64, max: u64 },

    /// Arithmetic fault in a `TC_BigInt*` capability (division by zero,
    /// overflow, malformed decimal string).
    #[error("arithmetic fault: {0}")]
    Arithmetic(String),

    /// Cryptographic capability fault (malformed signature or digest input).
    #[error("crypto fault: {0}")]
    Crypto(String),

    /// JSON capability fault (parse failure, bad handle, missing key,
    /// wrong value type).
    #[error("json fault: {0}")]
    Json(String),

    /// Host-call dispatch hit an index with no registered capability.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// The action selector named an entry point the module does not export.
    #[error("unknown entry point: {0}")]
    BadEntryPoint(String),

    /// Call input or deployment payload framing was malformed.
    #[error("bad payload: {0}")]
    BadPayload(String),

    /// Nested call depth exceeded the configured maximum.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded { depth: u16, max: u16 },

    /// An engine was constructed with a zero gas limit.
    #[error("gas limit must be positive")]
    ZeroGasLimit,

    /// Insufficient balance for a value transfer.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    /// Ledger access error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Module loading/linking error.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Internal error (programming error in the host, not the contract).
    #[error("internal error: {0}")]
    Internal(String),
}

impl VmError {
    /// Returns true for an explicit, intentional revert (including failed
    /// assert/require).
    #[must_use]
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Revert(_))
    }

    /// Returns true if the current frame's buffered state effects should
    /// still be committed despite the error terminating the run.
    #[must_use]
    pub fn commits_frame(&self) -> bool {
        matches!(self, Self::Exit(_))
    }

    /// Returns true when the error terminates the whole run rather than
    /// just the frame that raised it.
    ///
    /// Frame-local failures (reverts, capability faults) surface to the
    /// calling contract as a nested-call error result; these unwind the
    /// entire frame stack instead.
    #[must_use]
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            Self::OutOfGas
                | Self::Exit(_)
                | Self::Abort
                | Self::ZeroGasLimit
                | Self::State(_)
                | Self::Internal(_)
        )
    }
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from Ledger operations.
#[derive(Debug, Error, Clone)]
pub enum StateError {
    /// Balance subtraction would go below zero.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    /// Balance addition overflowed.
    #[error("balance overflow for {0:?}")]
    BalanceOverflow(Address),

    /// Ledger backend is unavailable.
    #[error("ledger unavailable")]
    Unavailable,

    /// Other ledger error.
    #[error("ledger error: {0}")]
    Other(String),
}

// =============================================================================
// LOAD ERRORS
// =============================================================================

/// Errors from module loading and import linking.
///
/// These occur before any gas is charged and before an App is considered
/// instantiated.
#[derive(Debug, Error, Clone)]
pub enum LoadError {
    /// The module byte stream failed structural validation.
    #[error("invalid module: {0}")]
    InvalidModule(String),

    /// No code is stored for the address.
    #[error("no code at address: {0:?}")]
    CodeMissing(Address),

    /// Stored code exceeds the size limit.
    #[error("code size exceeded: {size} > {max} bytes")]
    CodeTooLarge { size: usize, max: usize },

    /// The module imports from a namespace the host does not provide.
    #[error("unknown import namespace: {0}")]
    UnknownNamespace(String),

    /// The module imports a function name absent from the registry.
    #[error("unknown import: {namespace}::{name}")]
    UnknownImport { namespace: String, name: String },
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_error_display() {
        assert_eq!(VmError::OutOfGas.to_string(), "out of gas");

        let err = VmError::MemoryFault { offset: 16, len: 4 };
        assert_eq!(err.to_string(), "memory fault: offset 16, len 4");

        let err = VmError::CallDepthExceeded { depth: 65, max: 64 };
        assert_eq!(err.to_string(), "call depth exceeded: 65 > 64");
    }

    #[test]
    fn test_vm_error_is_revert() {
        assert!(VmError::Revert("require failed".into()).is_revert());
        assert!(!VmError::OutOfGas.is_revert());
        assert!(!VmError::Abort.is_revert());
    }

    #[test]
    fn test_vm_error_commits_frame() {
        assert!(VmError::Exit(0).commits_frame());
        assert!(!VmError::Abort.commits_frame());
        assert!(!VmError::Revert("r".into()).commits_frame());
        assert!(!VmError::OutOfGas.commits_frame());
    }

    #[test]
    fn test_vm_error_ends_run() {
        // Whole-run terminators.
        assert!(VmError::OutOfGas.ends_run());
        assert!(VmError::Exit(1).ends_run());
        assert!(VmError::Abort.ends_run());
        assert!(VmError::Internal("bug".into()).ends_run());

        // Frame-local failures the caller may recover from.
        assert!(!VmError::Revert("r".into()).ends_run());
        assert!(!VmError::MemoryFault { offset: 0, len: 1 }.ends_run());
        assert!(!VmError::Arithmetic("div by zero".into()).ends_run());
        assert!(!VmError::BadEntryPoint("f".into()).ends_run());
    }

    #[test]
    fn test_state_error_conversion() {
        let state_err = StateError::Unavailable;
        let vm_err: VmError = state_err.into();
        assert!(matches!(vm_err, VmError::State(_)));
    }

    #[test]
    fn test_load_error_conversion() {
        let load_err = LoadError::UnknownImport {
            namespace: "env".into(),
            name: "TC_Missing".into(),
        };
        assert_eq!(load_err.to_string(), "unknown import: env::TC_Missing");
        let vm_err: VmError = load_err.into();
        assert!(matches!(vm_err, VmError::Load(_)));
    }
}
