//! # Host Capability Registry
//!
//! The host-side function namespace a contract links against. Every
//! capability lives under the reserved `"env"` namespace and is addressed
//! by a stable ordinal index assigned at registration.
//!
//! Capabilities implement [`HostFunc`]: a pricing hook consulted before
//! execution and the execution body itself. The engine charges the price
//! against the run's gas counter first; the body only runs if the charge
//! fits the remaining budget.

pub mod bigint;
pub mod chain;
pub mod control;
pub mod crypto;
pub mod gas_table;
pub mod json;
pub mod memory_funcs;
pub mod msg;

use crate::errors::{LoadError, VmError};
use crate::ports::outbound::{ImportGlobal, ImportModule};
use crate::vm::engine::CallEnv;
use std::collections::HashMap;
use std::sync::Arc;

/// The only import namespace the host provides.
pub const ENV_NAMESPACE: &str = "env";

// =============================================================================
// HOST FUNCTION TRAIT
// =============================================================================

/// One named host capability.
///
/// `gas` must be deterministic: a pure function of the arguments and the
/// memory they reference. `call` runs only after the price has been charged.
pub trait HostFunc: Send + Sync {
    /// Prices the call. Charged in full before `call` runs.
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError>;

    /// Executes the capability.
    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError>;
}

// =============================================================================
// ENV TABLE
// =============================================================================

/// Registry of host capabilities, shared by all apps linked through it.
pub struct EnvTable {
    index: HashMap<String, u32>,
    funcs: Vec<Arc<dyn HostFunc>>,
    names: Vec<String>,
    globals: Vec<ImportGlobal>,
}

impl Default for EnvTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvTable {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            funcs: Vec::new(),
            names: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Registers a capability under `name`.
    ///
    /// Re-registering an existing name replaces the function but keeps its
    /// ordinal index, so already-linked modules stay valid.
    pub fn register(&mut self, name: &str, func: Arc<dyn HostFunc>) {
        if let Some(&idx) = self.index.get(name) {
            self.funcs[idx as usize] = func;
            return;
        }
        let idx = self.funcs.len() as u32;
        self.index.insert(name.to_string(), idx);
        self.names.push(name.to_string());
        self.funcs.push(func);
    }

    /// Registers a global binding exposed through the import module.
    ///
    /// Re-registering a name replaces its value.
    pub fn register_global(&mut self, name: &str, value: u64) {
        if let Some(global) = self.globals.iter_mut().find(|g| g.name == name) {
            global.value = value;
            return;
        }
        self.globals.push(ImportGlobal {
            name: name.to_string(),
            value,
        });
    }

    /// Looks up a capability by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn HostFunc>> {
        self.index.get(name).map(|&i| Arc::clone(&self.funcs[i as usize]))
    }

    /// Looks up a capability by ordinal index.
    #[must_use]
    pub fn by_index(&self, index: u32) -> Option<Arc<dyn HostFunc>> {
        self.funcs.get(index as usize).map(Arc::clone)
    }

    /// Returns the ordinal index of a registered name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Returns the name registered at `index`.
    #[must_use]
    pub fn name_of(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Returns true if no capability is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Resolves an import namespace at link time.
    ///
    /// # Errors
    ///
    /// `LoadError::UnknownNamespace` for anything but `"env"`.
    pub fn resolve_import(&self, namespace: &str) -> Result<ImportModule, LoadError> {
        if namespace != ENV_NAMESPACE {
            return Err(LoadError::UnknownNamespace(namespace.to_string()));
        }
        Ok(ImportModule {
            namespace: ENV_NAMESPACE.to_string(),
            functions: self.names.clone(),
            globals: self.globals.clone(),
        })
    }

    /// Builds the standard registry with every built-in capability.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut env = Self::new();

        env.register("TC_CallContract", Arc::new(chain::CallContract));
        env.register("TC_DelegateCallContract", Arc::new(chain::DelegateCallContract));

        env.register("TC_BigIntAdd", Arc::new(bigint::BigIntAdd));
        env.register("TC_BigIntSub", Arc::new(bigint::BigIntSub));
        env.register("TC_BigIntMul", Arc::new(bigint::BigIntMul));
        env.register("TC_BigIntDiv", Arc::new(bigint::BigIntDiv));
        env.register("TC_BigIntMod", Arc::new(bigint::BigIntMod));
        env.register("TC_BigIntCmp", Arc::new(bigint::BigIntCmp));
        env.register("TC_BigIntToInt64", Arc::new(bigint::BigIntToInt64));

        env.register("exit", Arc::new(control::Exit));
        env.register("abort", Arc::new(control::Abort));
        env.register("malloc", Arc::new(memory_funcs::Malloc));
        env.register("calloc", Arc::new(memory_funcs::Calloc));
        env.register("realloc", Arc::new(memory_funcs::Realloc));
        env.register("prints_l", Arc::new(memory_funcs::PrintsL));
        env.register("free", Arc::new(memory_funcs::Free));
        env.register("memcpy", Arc::new(memory_funcs::Memcpy));
        env.register("memset", Arc::new(memory_funcs::Memset));
        env.register("memmove", Arc::new(memory_funcs::Memmove));
        env.register("memcmp", Arc::new(memory_funcs::Memcmp));
        env.register("strcmp", Arc::new(memory_funcs::Strcmp));
        env.register("strcpy", Arc::new(memory_funcs::Strcpy));
        env.register("strlen", Arc::new(memory_funcs::Strlen));
        env.register("strconcat", Arc::new(memory_funcs::Strconcat));
        env.register("atoi", Arc::new(memory_funcs::Atoi));
        env.register("atoi64", Arc::new(memory_funcs::Atoi64));
        env.register("itoa", Arc::new(memory_funcs::Itoa));
        env.register("i64toa", Arc::new(memory_funcs::I64toa));

        env.register("TC_GetMsgData", Arc::new(msg::GetMsgData));
        env.register("TC_GetMsgGas", Arc::new(msg::GetMsgGas));
        env.register("TC_GetMsgSender", Arc::new(msg::GetMsgSender));
        env.register("TC_GetMsgSign", Arc::new(msg::GetMsgSign));
        env.register("TC_Assert", Arc::new(control::Assert));
        env.register("TC_Require", Arc::new(control::Require));
        env.register("TC_GasLeft", Arc::new(msg::GasLeft));
        env.register("TC_RequireWithMsg", Arc::new(control::RequireWithMsg));
        env.register("TC_Revert", Arc::new(control::Revert));
        env.register("TC_RevertWithMsg", Arc::new(control::RevertWithMsg));
        env.register("TC_IsHexAddress", Arc::new(msg::IsHexAddress));
        env.register("TC_Payable", Arc::new(msg::Payable));

        env.register("TC_Prints", Arc::new(memory_funcs::Prints));
        env.register("TC_GetSelfAddress", Arc::new(msg::GetSelfAddress));
        env.register("TC_Ripemd160", Arc::new(crypto::Ripemd160Func));
        env.register("TC_Sha256", Arc::new(crypto::Sha256Func));
        env.register("TC_Keccak256", Arc::new(crypto::Keccak256Func));
        env.register("TC_Ecrecover", Arc::new(crypto::Ecrecover));

        env.register("TC_JsonParse", Arc::new(json::JsonParse));
        env.register("TC_JsonGetInt", Arc::new(json::JsonGetInt));
        env.register("TC_JsonGetInt64", Arc::new(json::JsonGetInt64));
        env.register("TC_JsonGetString", Arc::new(json::JsonGetString));
        env.register("TC_JsonGetAddress", Arc::new(json::JsonGetAddress));
        env.register("TC_JsonGetBigInt", Arc::new(json::JsonGetBigInt));
        env.register("TC_JsonGetFloat", Arc::new(json::JsonGetFloat));
        env.register("TC_JsonGetDouble", Arc::new(json::JsonGetDouble));
        env.register("TC_JsonGetObject", Arc::new(json::JsonGetObject));
        env.register("TC_JsonNewObject", Arc::new(json::JsonNewObject));
        env.register("TC_JsonPutInt", Arc::new(json::JsonPutInt));
        env.register("TC_JsonPutInt64", Arc::new(json::JsonPutInt64));
        env.register("TC_JsonPutString", Arc::new(json::JsonPutString));
        env.register("TC_JsonPutAddress", Arc::new(json::JsonPutAddress));
        env.register("TC_JsonPutBigInt", Arc::new(json::JsonPutBigInt));
        env.register("TC_JsonPutFloat", Arc::new(json::JsonPutFloat));
        env.register("TC_JsonPutDouble", Arc::new(json::JsonPutDouble));
        env.register("TC_JsonPutObject", Arc::new(json::JsonPutObject));
        env.register("TC_JsonToString", Arc::new(json::JsonToString));

        env.register("TC_Transfer", Arc::new(chain::Transfer));
        env.register("TC_GetBalance", Arc::new(chain::GetBalance));
        env.register("TC_SelfDestruct", Arc::new(chain::SelfDestruct));
        env.register("TC_Notify", Arc::new(chain::Notify));

        env
    }
}

// =============================================================================
// TESTS
// =============================================================================
