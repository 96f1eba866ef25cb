//! # In-Memory Ledger Adapter
//!
//! Thread-safe in-memory implementation of the [`Ledger`] port, used as the
//! root state store in tests and standalone deployments.

use crate::domain::entities::LogEntry;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::StateError;
use crate::ports::outbound::Ledger;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct LedgerInner {
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    logs: Vec<LogEntry>,
    destroyed: HashMap<Address, Address>,
}

/// In-memory account/state/log store.
///
/// Mutators take `&self`; all state sits behind one `RwLock` so a single
/// handle can be shared across nested frames and across threads.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerInner>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor: a ledger pre-funded with `(address, balance)`
    /// pairs.
    #[must_use]
    pub fn with_balances(accounts: &[(Address, U256)]) -> Self {
        let ledger = Self::new();
        {
            let mut inner = ledger.inner.write().unwrap_or_else(|e| e.into_inner());
            for &(addr, balance) in accounts {
                inner.balances.insert(addr, balance);
            }
        }
        ledger
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerInner>, StateError> {
        self.inner.read().map_err(|_| StateError::Unavailable)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerInner>, StateError> {
        self.inner.write().map_err(|_| StateError::Unavailable)
    }
}

impl Ledger for InMemoryLedger {
    fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        Ok(self.read()?.code.get(&address).cloned().unwrap_or_default())
    }

    fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        debug!(address = %address, len = code.len(), "set_code");
        self.write()?.code.insert(address, code);
        Ok(())
    }

    fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        Ok(self
            .read()?
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    fn add_balance(&self, address: Address, amount: U256) -> Result<(), StateError> {
        let mut inner = self.write()?;
        let current = inner.balances.get(&address).copied().unwrap_or_default();
        let new = current
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow(address))?;
        inner.balances.insert(address, new);
        Ok(())
    }

    fn sub_balance(&self, address: Address, amount: U256) -> Result<(), StateError> {
        let mut inner = self.write()?;
        let current = inner.balances.get(&address).copied().unwrap_or_default();
        if current < amount {
            return Err(StateError::InsufficientBalance {
                required: amount,
                available: current,
            });
        }
        inner.balances.insert(address, current - amount);
        Ok(())
    }

    fn append_log(&self, entry: LogEntry) -> Result<(), StateError> {
        self.write()?.logs.push(entry);
        Ok(())
    }

    fn logs(&self) -> Result<Vec<LogEntry>, StateError> {
        Ok(self.read()?.logs.clone())
    }

    fn mark_destroyed(&self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        debug!(address = %address, beneficiary = %beneficiary, "mark_destroyed");
        self.write()?.destroyed.insert(address, beneficiary);
        Ok(())
    }

    fn is_destroyed(&self, address: Address) -> Result<bool, StateError> {
        Ok(self.read()?.destroyed.contains_key(&address))
    }
}

// =============================================================================
// TESTS
// =============================================================================
