//! # State Overlay
//!
//! A buffered write-set layered over a parent [`Ledger`] view. Each call
//! frame executes against its own overlay; `commit` flushes the buffered
//! effects into the parent, dropping the overlay discards them. Nested
//! frames stack overlays, so child effects only reach the real ledger when
//! every frame on the path commits.

use crate::domain::entities::LogEntry;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::StateError;
use crate::ports::outbound::Ledger;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct OverlayInner {
    /// Absolute balances for touched accounts.
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    logs: Vec<LogEntry>,
    destroyed: HashMap<Address, Address>,
}

/// One frame's buffered view of the ledger.
///
/// Reads fall through to the parent for untouched keys; writes stay local
/// until [`StateOverlay::commit`].
pub struct StateOverlay {
    parent: Arc<dyn Ledger>,
    inner: RwLock<OverlayInner>,
}

impl StateOverlay {
    /// Creates an empty overlay over `parent`.
    #[must_use]
    pub fn new(parent: Arc<dyn Ledger>) -> Self {
        Self {
            parent,
            inner: RwLock::new(OverlayInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, OverlayInner>, StateError> {
        self.inner.read().map_err(|_| StateError::Unavailable)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, OverlayInner>, StateError> {
        self.inner.write().map_err(|_| StateError::Unavailable)
    }

    /// Flushes all buffered effects into the parent view.
    ///
    /// Balances are committed as deltas against the parent's current value,
    /// so sibling frames that already committed are not clobbered.
    pub fn commit(&self) -> Result<(), StateError> {
        let mut inner = self.write()?;

        for (addr, balance) in inner.balances.drain() {
            let parent_balance = self.parent.get_balance(addr)?;
            if balance >= parent_balance {
                self.parent.add_balance(addr, balance - parent_balance)?;
            } else {
                self.parent.sub_balance(addr, parent_balance - balance)?;
            }
        }
        for (addr, code) in inner.code.drain() {
            self.parent.set_code(addr, code)?;
        }
        for entry in inner.logs.drain(..) {
            self.parent.append_log(entry)?;
        }
        for (addr, beneficiary) in inner.destroyed.drain() {
            self.parent.mark_destroyed(addr, beneficiary)?;
        }
        Ok(())
    }

    /// Number of buffered log entries (not those visible through the parent).
    #[must_use]
    pub fn pending_logs(&self) -> usize {
        self.inner.read().map(|i| i.logs.len()).unwrap_or(0)
    }
}

impl Ledger for StateOverlay {
    fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        if let Some(code) = self.read()?.code.get(&address) {
            return Ok(code.clone());
        }
        self.parent.get_code(address)
    }

    fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.write()?.code.insert(address, code);
        Ok(())
    }

    fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        if let Some(balance) = self.read()?.balances.get(&address) {
            return Ok(*balance);
        }
        self.parent.get_balance(address)
    }

    fn add_balance(&self, address: Address, amount: U256) -> Result<(), StateError> {
        let current = self.get_balance(address)?;
        let new = current
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow(address))?;
        self.write()?.balances.insert(address, new);
        Ok(())
    }

    fn sub_balance(&self, address: Address, amount: U256) -> Result<(), StateError> {
        let current = self.get_balance(address)?;
        if current < amount {
            return Err(StateError::InsufficientBalance {
                required: amount,
                available: current,
            });
        }
        self.write()?.balances.insert(address, current - amount);
        Ok(())
    }

    fn append_log(&self, entry: LogEntry) -> Result<(), StateError> {
        self.write()?.logs.push(entry);
        Ok(())
    }

    fn logs(&self) -> Result<Vec<LogEntry>, StateError> {
        let mut all = self.parent.logs()?;
        all.extend(self.read()?.logs.iter().cloned());
        Ok(all)
    }

    fn mark_destroyed(&self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        self.write()?.destroyed.insert(address, beneficiary);
        Ok(())
    }

    fn is_destroyed(&self, address: Address) -> Result<bool, StateError> {
        if self.read()?.destroyed.contains_key(&address) {
            return Ok(true);
        }
        self.parent.is_destroyed(address)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ledger::InMemoryLedger;
    use crate::domain::value_objects::Hash;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_reads_fall_through() {
        let base = Arc::new(InMemoryLedger::new());
        base.add_balance(addr(1), U256::from(100)).unwrap();
        base.set_code(addr(1), Bytes::from_slice(b"code")).unwrap();

        let overlay = StateOverlay::new(base);
        assert_eq!(overlay.get_balance(addr(1)).unwrap(), U256::from(100));
        assert_eq!(overlay.get_code(addr(1)).unwrap().as_slice(), b"code");
    }

    #[test]
    fn test_writes_buffered_until_commit() {
        let base: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        base.add_balance(addr(1), U256::from(100)).unwrap();

        let overlay = StateOverlay::new(Arc::clone(&base));
        overlay.sub_balance(addr(1), U256::from(30)).unwrap();
        overlay.add_balance(addr(2), U256::from(30)).unwrap();

        // Parent unchanged before commit.
        assert_eq!(base.get_balance(addr(1)).unwrap(), U256::from(100));
        assert_eq!(base.get_balance(addr(2)).unwrap(), U256::zero());
        // Overlay sees the new values.
        assert_eq!(overlay.get_balance(addr(1)).unwrap(), U256::from(70));

        overlay.commit().unwrap();
        assert_eq!(base.get_balance(addr(1)).unwrap(), U256::from(70));
        assert_eq!(base.get_balance(addr(2)).unwrap(), U256::from(30));
    }

    #[test]
    fn test_drop_discards_effects() {
        let base: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        base.add_balance(addr(1), U256::from(100)).unwrap();

        {
            let overlay = StateOverlay::new(Arc::clone(&base));
            overlay.sub_balance(addr(1), U256::from(100)).unwrap();
            overlay
                .append_log(LogEntry::new(addr(1), vec![Hash::ZERO], Bytes::new()))
                .unwrap();
            assert_eq!(overlay.pending_logs(), 1);
            // Dropped without commit.
        }

        assert_eq!(base.get_balance(addr(1)).unwrap(), U256::from(100));
        assert!(base.logs().unwrap().is_empty());
    }

    #[test]
    fn test_sub_balance_insufficient() {
        let base = Arc::new(InMemoryLedger::new());
        let overlay = StateOverlay::new(base);

        let err = overlay.sub_balance(addr(1), U256::from(1)).unwrap_err();
        assert!(matches!(err, StateError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_nested_overlays_commit_inward() {
        let base: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        base.add_balance(addr(1), U256::from(50)).unwrap();

        let outer: Arc<StateOverlay> = Arc::new(StateOverlay::new(Arc::clone(&base)));
        let inner = StateOverlay::new(Arc::clone(&outer) as Arc<dyn Ledger>);

        inner.sub_balance(addr(1), U256::from(20)).unwrap();
        inner.commit().unwrap();

        // Inner committed into the outer overlay only.
        assert_eq!(outer.get_balance(addr(1)).unwrap(), U256::from(30));
        assert_eq!(base.get_balance(addr(1)).unwrap(), U256::from(50));

        outer.commit().unwrap();
        assert_eq!(base.get_balance(addr(1)).unwrap(), U256::from(30));
    }

    #[test]
    fn test_destroyed_marker() {
        let base: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let overlay = StateOverlay::new(Arc::clone(&base));

        overlay.mark_destroyed(addr(5), addr(9)).unwrap();
        assert!(overlay.is_destroyed(addr(5)).unwrap());
        assert!(!base.is_destroyed(addr(5)).unwrap());

        overlay.commit().unwrap();
        assert!(base.is_destroyed(addr(5)).unwrap());
    }
}
