//! # App
//!
//! One loaded contract: its address, code, linked module instance, and the
//! linear memory the instance executes against. Apps are cached per engine
//! and shared across frames via `Arc`; the memory sits behind a lock so
//! host capabilities can mutate it through a shared handle.

use crate::domain::value_objects::{Address, Bytes};
use crate::errors::VmError;
use crate::ports::outbound::{HostDispatch, ModuleInstance};
use crate::vm::memory::LinearMemory;
use std::sync::RwLock;

/// A loaded, linked contract bound to an address.
///
/// Linear memory persists across runs within one engine, so heap contents
/// written by one invocation are visible to the next unless the app is
/// force-reloaded.
pub struct App {
    address: Address,
    code: Bytes,
    instance: Box<dyn ModuleInstance>,
    memory: RwLock<LinearMemory>,
}

impl App {
    /// Creates an app from its linked instance and a fresh memory image.
    #[must_use]
    pub fn new(
        address: Address,
        code: Bytes,
        instance: Box<dyn ModuleInstance>,
        initial_memory: usize,
        max_memory: usize,
    ) -> Self {
        Self {
            address,
            code,
            instance,
            memory: RwLock::new(LinearMemory::new(initial_memory, max_memory)),
        }
    }

    /// The address this app's code is bound to.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The raw module bytes the app was loaded from.
    #[must_use]
    pub fn code(&self) -> &Bytes {
        &self.code
    }

    /// Returns true if the module exports the named entry point.
    #[must_use]
    pub fn has_export(&self, name: &str) -> bool {
        self.instance.has_export(name)
    }

    /// Invokes an exported entry point.
    pub fn invoke(
        &self,
        entry: &str,
        args: &[u64],
        host: &mut dyn HostDispatch,
    ) -> Result<u64, VmError> {
        self.instance.invoke(entry, args, host)
    }

    /// Runs `f` with shared access to the linear memory.
    pub fn with_memory<T>(
        &self,
        f: impl FnOnce(&LinearMemory) -> Result<T, VmError>,
    ) -> Result<T, VmError> {
        let mem = self
            .memory
            .read()
            .map_err(|_| VmError::Internal("app memory lock poisoned".into()))?;
        f(&mem)
    }

    /// Runs `f` with exclusive access to the linear memory.
    pub fn with_memory_mut<T>(
        &self,
        f: impl FnOnce(&mut LinearMemory) -> Result<T, VmError>,
    ) -> Result<T, VmError> {
        let mut mem = self
            .memory
            .write()
            .map_err(|_| VmError::Internal("app memory lock poisoned".into()))?;
        f(&mut mem)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("address", &self.address)
            .field("code_len", &self.code.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopInstance;

    impl ModuleInstance for NoopInstance {
        fn has_export(&self, name: &str) -> bool {
            name == "thunderchain_main"
        }

        fn invoke(
            &self,
            _entry: &str,
            args: &[u64],
            _host: &mut dyn HostDispatch,
        ) -> Result<u64, VmError> {
            Ok(args.first().copied().unwrap_or(0))
        }
    }

    #[test]
    fn test_app_exports_and_memory() {
        let app = App::new(
            Address::new([7u8; 20]),
            Bytes::from_slice(b"\0asm"),
            Box::new(NoopInstance),
            4096,
            65536,
        );

        assert!(app.has_export("thunderchain_main"));
        assert!(!app.has_export("missing"));

        let ptr = app
            .with_memory_mut(|m| m.alloc_write_cstr(b"persist"))
            .unwrap();
        // Heap contents survive across accesses.
        let s = app.with_memory(|m| Ok(m.cstr(ptr)?.to_vec())).unwrap();
        assert_eq!(s, b"persist");
    }
}
