//! # Script Loader Adapter
//!
//! A programmable [`ModuleLoader`] for embedding and testing: modules are
//! registered as Rust closures keyed by their exact code bytes. Loading
//! performs the same link-time checks a real bytecode loader would - the
//! module magic and every declared import are validated before an instance
//! is handed out.

use crate::errors::{LoadError, VmError};
use crate::ports::outbound::{HostDispatch, ImportModule, ModuleInstance, ModuleLoader};
use crate::vm::deploy::MODULE_MAGIC;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An entry-point body: receives the host dispatch surface and the flat
/// argument vector.
pub type ScriptFn = dyn Fn(&mut dyn HostDispatch, &[u64]) -> Result<u64, VmError> + Send + Sync;

// =============================================================================
// SCRIPT MODULE
// =============================================================================

/// A scripted module: named entry points plus the host imports it declares.
///
/// Declared imports are resolved at load time; an import absent from the
/// registry fails the load with `LoadError::UnknownImport` before any gas
/// is charged.
#[derive(Default)]
pub struct ScriptModule {
    exports: HashMap<String, Arc<ScriptFn>>,
    imports: Vec<String>,
}

impl ScriptModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exported entry point.
    #[must_use]
    pub fn export(
        mut self,
        name: &str,
        body: impl Fn(&mut dyn HostDispatch, &[u64]) -> Result<u64, VmError> + Send + Sync + 'static,
    ) -> Self {
        self.exports.insert(name.to_string(), Arc::new(body));
        self
    }

    /// Declares a host import the module needs at link time.
    #[must_use]
    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(name.to_string());
        self
    }
}

struct ScriptInstance(Arc<ScriptModule>);

impl ModuleInstance for ScriptInstance {
    fn has_export(&self, name: &str) -> bool {
        self.0.exports.contains_key(name)
    }

    fn invoke(
        &self,
        entry: &str,
        args: &[u64],
        host: &mut dyn HostDispatch,
    ) -> Result<u64, VmError> {
        let body = self
            .0
            .exports
            .get(entry)
            .ok_or_else(|| VmError::BadEntryPoint(entry.to_string()))?;
        body(host, args)
    }
}

// =============================================================================
// SCRIPT LOADER
// =============================================================================

/// Loader resolving code byte streams to registered script modules.
#[derive(Default)]
pub struct ScriptLoader {
    modules: RwLock<HashMap<Vec<u8>, Arc<ScriptModule>>>,
}

impl ScriptLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under the exact `code` bytes.
    pub fn register(&self, code: &[u8], module: ScriptModule) {
        if let Ok(mut modules) = self.modules.write() {
            modules.insert(code.to_vec(), Arc::new(module));
        }
    }
}

impl ModuleLoader for ScriptLoader {
    fn load(
        &self,
        code: &[u8],
        imports: &ImportModule,
    ) -> Result<Box<dyn ModuleInstance>, LoadError> {
        if code.len() < MODULE_MAGIC.len() || code[..4] != MODULE_MAGIC {
            return Err(LoadError::InvalidModule("missing module magic".into()));
        }

        let module = self
            .modules
            .read()
            .map_err(|_| LoadError::InvalidModule("loader registry poisoned".into()))?
            .get(code)
            .cloned()
            .ok_or_else(|| LoadError::InvalidModule("unregistered module".into()))?;

        for name in &module.imports {
            if !imports.contains(name) {
                return Err(LoadError::UnknownImport {
                    namespace: imports.namespace.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(Box::new(ScriptInstance(module)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
