//! # Domain Invariants
//!
//! Critical invariants that MUST hold during contract execution.
//! These are checked at runtime at frame boundaries.
//!
//! - INVARIANT-1: Gas Ceiling (`used <= limit`, monotone)
//! - INVARIANT-2: Deterministic Pricing (cost is a function of arguments
//!   and referenced memory only)
//! - INVARIANT-3: Frame Atomicity (effects commit fully or not at all)
//! - INVARIANT-4: Call Depth Limit

use crate::domain::entities::EngineConfig;
use crate::domain::value_objects::GasCounter;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// INVARIANT-1: Gas Ceiling.
///
/// Consumed gas never exceeds the run's original limit.
#[must_use]
pub fn check_gas_ceiling(gas: &GasCounter) -> bool {
    gas.used() <= gas.limit()
}

/// INVARIANT-4: Call Depth Limit.
#[must_use]
pub fn check_call_depth(depth: u16, config: &EngineConfig) -> bool {
    depth <= config.max_call_depth
}

/// Checks the engine-level invariants at a frame boundary.
#[must_use]
pub fn check_frame_invariants(
    gas: &GasCounter,
    depth: u16,
    config: &EngineConfig,
) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_gas_ceiling(gas) {
        violations.push(InvariantViolation::GasCeilingExceeded {
            used: gas.used(),
            limit: gas.limit(),
        });
    }

    if !check_call_depth(depth, config) {
        violations.push(InvariantViolation::CallDepthExceeded {
            depth,
            max: config.max_call_depth,
        });
    }

    InvariantCheckResult { violations }
}

// =============================================================================
// VIOLATIONS
// =============================================================================

/// A violated invariant. Any violation is a host programming error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Gas used exceeded the run limit.
    GasCeilingExceeded { used: u64, limit: u64 },
    /// Nested-call depth exceeded the configured maximum.
    CallDepthExceeded { depth: u16, max: u16 },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GasCeilingExceeded { used, limit } => {
                write!(f, "gas ceiling exceeded: {used} > {limit}")
            }
            Self::CallDepthExceeded { depth, max } => {
                write!(f, "call depth exceeded: {depth} > {max}")
            }
        }
    }
}

/// Result of checking frame invariants.
#[derive(Clone, Debug)]
pub struct InvariantCheckResult {
    /// Violations found (empty means all invariants hold).
    pub violations: Vec<InvariantViolation>,
}

impl InvariantCheckResult {
    /// Returns true if no invariant was violated.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.violations.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
