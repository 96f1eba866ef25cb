//! # Core Domain Entities
//!
//! Main business entities for contract execution: the call message, the
//! per-run execution context, run lifecycle states, and engine configuration.

use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// MESSAGE
// =============================================================================

/// The caller/callee/value/gas/input envelope for one invocation.
///
/// Immutable for the duration of one frame. A nested call constructs a
/// derived message with a new sender (= the current callee) and its own
/// value and gas sub-budget.
#[derive(Clone, Debug)]
pub struct Message {
    /// Caller address.
    pub sender: Address,
    /// Callee address.
    pub to: Address,
    /// Value transferred, if any.
    pub value: Option<U256>,
    /// Gas limit for this frame.
    pub gas_limit: u64,
    /// Call input (`action|payload`).
    pub input: Bytes,
    /// Address the executed code is bound to, when it differs from `to`
    /// (delegate calls).
    pub code_addr: Option<Address>,
}

impl Message {
    /// Creates a top-level message.
    #[must_use]
    pub fn new(sender: Address, to: Address, value: Option<U256>, gas_limit: u64) -> Self {
        Self {
            sender,
            to,
            value,
            gas_limit,
            input: Bytes::new(),
            code_addr: None,
        }
    }

    /// Derives the message for a nested `TC_CallContract` frame.
    ///
    /// The child's sender is this frame's callee; the child carries its own
    /// value and gas sub-budget and executes the target's code against the
    /// target's identity.
    #[must_use]
    pub fn derive_call(&self, to: Address, value: Option<U256>, gas: u64, input: Bytes) -> Self {
        Self {
            sender: self.to,
            to,
            value,
            gas_limit: gas,
            input,
            code_addr: None,
        }
    }

    /// Derives the message for a nested `TC_DelegateCallContract` frame.
    ///
    /// Sender, callee and value are preserved; only the code binding moves
    /// to the delegate target.
    #[must_use]
    pub fn derive_delegate(&self, code_addr: Address, gas: u64, input: Bytes) -> Self {
        Self {
            sender: self.sender,
            to: self.to,
            value: self.value,
            gas_limit: gas,
            input,
            code_addr: Some(code_addr),
        }
    }

    /// The action selector of the current input: the bytes before the first
    /// `|` delimiter, or the whole input when no delimiter is present.
    #[must_use]
    pub fn action(&self) -> &[u8] {
        match self.input.as_slice().iter().position(|&b| b == b'|') {
            Some(pos) => &self.input.as_slice()[..pos],
            None => self.input.as_slice(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Address::ZERO, Address::ZERO, None, 0)
    }
}

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// Per-run chain context, owned by the engine and read-only to capabilities.
///
/// One context instance per engine; concurrent engines each own their own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
    /// Active contract/token identity for this transaction.
    pub token: Address,
    /// Block height.
    pub block_height: u64,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            timestamp: 0,
            token: Address::ZERO,
            block_height: 0,
        }
    }
}

// =============================================================================
// RUN STATE
// =============================================================================

/// Lifecycle of one top-level run.
///
/// `Created -> Instantiated -> Running -> {Completed | Reverted | OutOfGas | Faulted}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Engine constructed, no app instantiated yet.
    Created,
    /// At least one app instantiated and linked.
    Instantiated,
    /// An entry point is executing.
    Running,
    /// Run finished successfully; frame effects committed.
    Completed,
    /// Run ended in an explicit revert; frame effects discarded.
    Reverted,
    /// Gas budget exhausted; frame effects discarded.
    OutOfGas,
    /// Structural or capability fault; frame effects discarded.
    Faulted,
}

impl RunState {
    /// Returns true for the mutually exclusive terminal states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Reverted | Self::OutOfGas | Self::Faulted
        )
    }
}

// =============================================================================
// EXECUTION RESULT
// =============================================================================

/// Summarized outcome of one top-level run.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// Terminal state the run reached.
    pub state: RunState,
    /// Result code returned by the entry point (or exit code).
    pub ret: u64,
    /// Cumulative gas consumed.
    pub gas_used: u64,
    /// Error description for non-Completed runs.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Creates a completed result.
    #[must_use]
    pub fn completed(ret: u64, gas_used: u64) -> Self {
        Self {
            state: RunState::Completed,
            ret,
            gas_used,
            error: None,
        }
    }

    /// Creates a failed result in the given terminal state.
    #[must_use]
    pub fn failed(state: RunState, error: impl Into<String>, gas_used: u64) -> Self {
        Self {
            state,
            ret: 0,
            gas_used,
            error: Some(error.into()),
        }
    }

    /// Returns true if the run committed its effects.
    #[must_use]
    pub fn success(&self) -> bool {
        self.state == RunState::Completed
    }
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// Event emitted by a contract via `TC_Notify`, recorded in the Ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Contract address that emitted the event.
    pub address: Address,
    /// Indexed topics (topic 0 is the hashed event name).
    pub topics: Vec<Hash>,
    /// Non-indexed data.
    pub data: Bytes,
}

impl LogEntry {
    /// Creates a new log entry.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

// =============================================================================
// ENGINE CONFIGURATION
// =============================================================================

/// Execution limits for one engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum nested-call depth.
    pub max_call_depth: u16,
    /// Maximum code size in bytes.
    pub max_code_size: usize,
    /// Initial linear memory size per app, in bytes.
    pub initial_memory_size: usize,
    /// Maximum linear memory size per app, in bytes.
    pub max_memory_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            max_code_size: 1024 * 1024,              // 1 MB module ceiling
            initial_memory_size: 64 * 1024,          // one 64 KB page
            max_memory_size: 16 * 1024 * 1024,       // 16 MB
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
