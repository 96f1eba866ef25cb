//! # Execution Engine
//!
//! Owns one transaction's execution: the app cache, the call-frame stack,
//! the shared gas counter, and the per-run JSON heap. Each frame executes
//! against a buffered state view that commits into its parent only when the
//! frame succeeds, so nested effects compose transactionally.

use crate::domain::entities::{Context, EngineConfig, ExecutionResult, Message, RunState};
use crate::domain::invariants::check_frame_invariants;
use crate::domain::value_objects::{Address, Bytes, GasCounter, U256};
use crate::env::json::JsonHeap;
use crate::env::{EnvTable, ENV_NAMESPACE};
use crate::errors::{LoadError, StateError, VmError};
use crate::ports::outbound::{HostDispatch, Ledger, ModuleLoader};
use crate::vm::app::App;
use crate::vm::deploy::MODULE_MAGIC;
use crate::vm::overlay::StateOverlay;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// CALL FRAME
// =============================================================================

struct Frame {
    message: Message,
    app: Arc<App>,
    view: Arc<StateOverlay>,
    /// Identity the executing code acts as. Under a delegate call this is
    /// the caller's address, not the address the code was loaded from.
    self_addr: Address,
}

// =============================================================================
// ENGINE
// =============================================================================

/// One transaction's execution engine.
///
/// Engines are single-threaded and short-lived: construct, instantiate apps,
/// run, read the result. Concurrent transactions each get their own engine
/// with their own context; nothing here is process-global.
pub struct Engine {
    env: Arc<EnvTable>,
    loader: Arc<dyn ModuleLoader>,
    ledger: Arc<dyn Ledger>,
    config: EngineConfig,
    context: Context,
    message: Message,
    gas: GasCounter,
    apps: HashMap<Address, Arc<App>>,
    frames: Vec<Frame>,
    state: RunState,
    json: JsonHeap,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine for one transaction.
    ///
    /// # Errors
    ///
    /// `VmError::ZeroGasLimit` when the message carries no gas budget.
    pub fn new(
        message: Message,
        context: Context,
        ledger: Arc<dyn Ledger>,
        loader: Arc<dyn ModuleLoader>,
        env: Arc<EnvTable>,
        config: EngineConfig,
    ) -> Result<Self, VmError> {
        if message.gas_limit == 0 {
            return Err(VmError::ZeroGasLimit);
        }
        let gas = GasCounter::new(message.gas_limit);
        Ok(Self {
            env,
            loader,
            ledger,
            config,
            context,
            message,
            gas,
            apps: HashMap::new(),
            frames: Vec::new(),
            state: RunState::Created,
            json: JsonHeap::new(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Gas consumed so far.
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    /// Remaining gas budget.
    #[must_use]
    pub fn gas_left(&self) -> u64 {
        self.gas.remaining()
    }

    /// The chain context this engine runs under.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    fn current_ledger(&self) -> Arc<dyn Ledger> {
        match self.frames.last() {
            Some(frame) => Arc::clone(&frame.view) as Arc<dyn Ledger>,
            None => Arc::clone(&self.ledger),
        }
    }

    fn current_message(&self) -> &Message {
        self.frames
            .last()
            .map_or(&self.message, |frame| &frame.message)
    }

    fn current_self_address(&self) -> Address {
        self.frames
            .last()
            .map_or(self.message.to, |frame| frame.self_addr)
    }

    fn current_app(&self) -> Result<Arc<App>, VmError> {
        self.frames
            .last()
            .map(|frame| Arc::clone(&frame.app))
            .ok_or_else(|| VmError::Internal("no active call frame".into()))
    }

    // -------------------------------------------------------------------------
    // App lifecycle
    // -------------------------------------------------------------------------

    /// Fetches, loads, and links the app at `address`, caching the result.
    ///
    /// With `force_reload` the cached instance is discarded and rebuilt with
    /// a fresh memory image; otherwise a cached app (and its heap) is reused.
    pub fn new_app(&mut self, address: Address, force_reload: bool) -> Result<Arc<App>, VmError> {
        if !force_reload {
            if let Some(app) = self.apps.get(&address) {
                trace!(address = %address, "app cache hit");
                return Ok(Arc::clone(app));
            }
        }

        let code = self.current_ledger().get_code(address)?;
        if code.is_empty() {
            return Err(LoadError::CodeMissing(address).into());
        }
        if code.len() > self.config.max_code_size {
            return Err(LoadError::CodeTooLarge {
                size: code.len(),
                max: self.config.max_code_size,
            }
            .into());
        }

        // Link-time import resolution: fails before any gas is charged.
        let imports = self.env.resolve_import(ENV_NAMESPACE)?;
        let instance = self.loader.load(code.as_slice(), &imports)?;

        let app = Arc::new(App::new(
            address,
            code,
            instance,
            self.config.initial_memory_size,
            self.config.max_memory_size,
        ));
        self.apps.insert(address, Arc::clone(&app));
        if self.state == RunState::Created {
            self.state = RunState::Instantiated;
        }
        debug!(address = %address, "app instantiated");
        Ok(app)
    }

    /// Resolves a hex address string and instantiates the app behind it.
    pub fn app_by_name(&mut self, name: &str) -> Result<Arc<App>, VmError> {
        let address = Address::from_hex(name)
            .ok_or_else(|| VmError::BadPayload(format!("invalid app address: {name:?}")))?;
        self.new_app(address, false)
    }

    // -------------------------------------------------------------------------
    // Run
    // -------------------------------------------------------------------------

    /// Executes one entry point of `app` with the given `action|payload`
    /// input, against a fresh top-level state view.
    ///
    /// An optional 4-byte module-magic prefix on the input is ignored. On
    /// success (including `exit`) the frame's effects commit; on any failure
    /// they are discarded while consumed gas stays spent. The JSON heap is
    /// invalidated when the run ends, whatever the outcome.
    pub fn run(&mut self, app: &Arc<App>, input: &[u8]) -> Result<u64, VmError> {
        if self.state == RunState::Running {
            return Err(VmError::Internal("engine is already running".into()));
        }

        let input = input.strip_prefix(MODULE_MAGIC.as_slice()).unwrap_or(input);
        let mut message = self.message.clone();
        message.input = Bytes::from_slice(input);

        let view = Arc::new(StateOverlay::new(Arc::clone(&self.ledger)));
        self.frames.push(Frame {
            message,
            app: Arc::clone(app),
            view,
            self_addr: app.address(),
        });
        self.state = RunState::Running;

        let result = self.exec_frame();
        self.json.clear();

        let outcome = match result {
            Ok(ret) => {
                self.state = RunState::Completed;
                Ok(ret)
            }
            Err(VmError::Exit(code)) => {
                self.state = RunState::Completed;
                Ok(code)
            }
            Err(err) => {
                self.state = match err {
                    VmError::Revert(_) => RunState::Reverted,
                    VmError::OutOfGas => RunState::OutOfGas,
                    _ => RunState::Faulted,
                };
                warn!(state = ?self.state, error = %err, "run failed");
                Err(err)
            }
        };
        debug!(
            app = %app.address(),
            state = ?self.state,
            gas_used = self.gas.used(),
            "run finished"
        );
        outcome
    }

    /// Like [`Engine::run`] but folds the outcome into an [`ExecutionResult`].
    pub fn run_report(&mut self, app: &Arc<App>, input: &[u8]) -> ExecutionResult {
        match self.run(app, input) {
            Ok(ret) => ExecutionResult::completed(ret, self.gas.used()),
            Err(err) => ExecutionResult::failed(self.state, err.to_string(), self.gas.used()),
        }
    }

    /// Executes the frame on top of the stack and pops it, committing its
    /// view when the frame succeeded (or exited deliberately).
    fn exec_frame(&mut self) -> Result<u64, VmError> {
        let result = self.exec_frame_inner();
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| VmError::Internal("frame stack underflow".into()))?;

        let check = check_frame_invariants(&self.gas, self.frames.len() as u16, &self.config);
        if !check.ok() {
            for violation in &check.violations {
                warn!(%violation, "frame invariant violated");
            }
            return Err(VmError::Internal(format!(
                "invariant violated: {}",
                check.violations[0]
            )));
        }

        let commit = match &result {
            Ok(_) => true,
            Err(err) => err.commits_frame(),
        };
        if commit {
            frame.view.commit()?;
        }
        result
    }

    fn exec_frame_inner(&mut self) -> Result<u64, VmError> {
        let (app, message, view) = {
            let frame = self
                .frames
                .last()
                .ok_or_else(|| VmError::Internal("no active call frame".into()))?;
            (
                Arc::clone(&frame.app),
                frame.message.clone(),
                Arc::clone(&frame.view),
            )
        };

        // Value moves inside this frame's view so it rolls back with it.
        // A delegate frame (code_addr set) inherits the caller's message;
        // the value was already moved by the frame that created it.
        if message.code_addr.is_none() {
            if let Some(value) = message.value {
                if !value.is_zero() {
                    transfer(view.as_ref(), message.sender, message.to, value)?;
                }
            }
        }

        let action = std::str::from_utf8(message.action())
            .map_err(|_| VmError::BadPayload("action selector is not valid utf-8".into()))?
            .to_string();
        if !app.has_export(&action) {
            return Err(VmError::BadEntryPoint(action));
        }

        let payload = match message.input.as_slice().iter().position(|&b| b == b'|') {
            Some(pos) => &message.input.as_slice()[pos + 1..],
            None => &[][..],
        };
        let ptr = app.with_memory_mut(|m| m.alloc_write_cstr(payload))?;

        trace!(app = %app.address(), action = %action, "invoking entry point");
        app.invoke(&action, &[ptr, payload.len() as u64], self)
    }

    // -------------------------------------------------------------------------
    // Nested calls
    // -------------------------------------------------------------------------

    fn push_nested(
        &mut self,
        message: Message,
        app: Arc<App>,
        self_addr: Address,
    ) -> Result<u64, VmError> {
        // A child frame needs a non-empty sub-budget to enter at all.
        if self.gas.remaining() == 0 {
            return Err(VmError::OutOfGas);
        }
        let depth = self.frames.len() as u16;
        if depth >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded {
                depth: depth + 1,
                max: self.config.max_call_depth,
            });
        }

        let view = Arc::new(StateOverlay::new(self.current_ledger()));
        self.frames.push(Frame {
            message,
            app,
            view,
            self_addr,
        });
        self.exec_frame()
    }

    /// Runs the app at `to` in a child frame. The child's gas sub-budget is
    /// the remaining run budget; its state view commits into this frame's
    /// view only on success.
    pub(crate) fn call_contract(
        &mut self,
        to: Address,
        value: Option<U256>,
        input: Bytes,
    ) -> Result<u64, VmError> {
        let app = self.new_app(to, false)?;
        let gas = self.gas.remaining();
        let message = self.current_message().derive_call(to, value, gas, input);
        self.push_nested(message, app, to)
    }

    /// Runs the code at `code_addr` in a child frame while preserving this
    /// frame's identity (sender, callee, value).
    pub(crate) fn delegate_call(&mut self, code_addr: Address, input: Bytes) -> Result<u64, VmError> {
        let app = self.new_app(code_addr, false)?;
        let gas = self.gas.remaining();
        let self_addr = self.current_self_address();
        let message = self
            .current_message()
            .derive_delegate(code_addr, gas, input);
        self.push_nested(message, app, self_addr)
    }

    /// Destroys the executing contract: balance to `beneficiary`, code
    /// cleared, destruction marked, cached app evicted. Always terminates
    /// the run via `exit(0)`, committing the current frame.
    pub(crate) fn self_destruct(&mut self, beneficiary: Address) -> Result<(), VmError> {
        let address = self.current_self_address();
        let view = self.current_ledger();

        let balance = view.get_balance(address)?;
        if !balance.is_zero() {
            transfer(view.as_ref(), address, beneficiary, balance)?;
        }
        view.set_code(address, Bytes::new())?;
        view.mark_destroyed(address, beneficiary)?;
        self.apps.remove(&address);

        debug!(address = %address, beneficiary = %beneficiary, "self-destruct");
        Err(VmError::Exit(0))
    }
}

fn transfer(
    view: &dyn Ledger,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), VmError> {
    view.sub_balance(from, amount).map_err(|err| match err {
        StateError::InsufficientBalance {
            required,
            available,
        } => VmError::InsufficientBalance {
            required,
            available,
        },
        other => VmError::State(other),
    })?;
    view.add_balance(to, amount)?;
    Ok(())
}

// =============================================================================
// HOST DISPATCH
// =============================================================================

impl HostDispatch for Engine {
    /// Dispatches a host call: price first, execute only if the charge fits.
    fn call_host(&mut self, index: u32, args: &[u64]) -> Result<u64, VmError> {
        let func = self
            .env
            .by_index(index)
            .ok_or_else(|| VmError::UnknownCapability(format!("index {index}")))?;
        let name = self
            .env
            .name_of(index)
            .unwrap_or("<unnamed>")
            .to_string();

        let mut call_env = CallEnv { engine: self };
        let cost = func.gas(&call_env, args)?;
        if !call_env.engine.gas.consume(cost) {
            return Err(VmError::OutOfGas);
        }
        trace!(capability = %name, cost, args = args.len(), "host call");
        func.call(&mut call_env, args)
    }

    fn host_index(&self, name: &str) -> Option<u32> {
        self.env.index_of(name)
    }

    fn read_memory(&self, offset: u64, len: u64) -> Result<Vec<u8>, VmError> {
        self.current_app()?
            .with_memory(|m| Ok(m.read(offset, len)?.to_vec()))
    }

    fn write_memory(&mut self, offset: u64, data: &[u8]) -> Result<(), VmError> {
        self.current_app()?.with_memory_mut(|m| m.write(offset, data))
    }
}

// =============================================================================
// CALL ENVIRONMENT
// =============================================================================

/// What a host capability sees while it runs: the current frame's message
/// and state view, the calling app's memory, and the engine services it may
/// use (nested calls, JSON heap, gas).
pub struct CallEnv<'a> {
    pub(crate) engine: &'a mut Engine,
}

impl CallEnv<'_> {
    /// The current frame's message.
    #[must_use]
    pub fn message(&self) -> &Message {
        self.engine.current_message()
    }

    /// The chain context of this run.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.engine.context
    }

    /// The current frame's buffered state view.
    #[must_use]
    pub fn ledger(&self) -> Arc<dyn Ledger> {
        self.engine.current_ledger()
    }

    /// The identity the executing code acts as.
    #[must_use]
    pub fn self_address(&self) -> Address {
        self.engine.current_self_address()
    }

    /// Remaining gas in the run budget.
    #[must_use]
    pub fn gas_left(&self) -> u64 {
        self.engine.gas.remaining()
    }

    // -------------------------------------------------------------------------
    // App memory
    // -------------------------------------------------------------------------

    /// Reads raw bytes from the calling app's memory.
    pub fn mem_read(&self, offset: u64, len: u64) -> Result<Vec<u8>, VmError> {
        self.engine
            .current_app()?
            .with_memory(|m| Ok(m.read(offset, len)?.to_vec()))
    }

    /// Writes raw bytes into the calling app's memory.
    pub fn mem_write(&self, offset: u64, data: &[u8]) -> Result<(), VmError> {
        self.engine
            .current_app()?
            .with_memory_mut(|m| m.write(offset, data))
    }

    /// Fills a region with one byte value.
    pub fn mem_fill(&self, offset: u64, len: u64, byte: u8) -> Result<(), VmError> {
        self.engine
            .current_app()?
            .with_memory_mut(|m| m.fill(offset, len, byte))
    }

    /// Overlap-safe copy within the calling app's memory.
    pub fn mem_copy(&self, dest: u64, src: u64, len: u64) -> Result<(), VmError> {
        self.engine
            .current_app()?
            .with_memory_mut(|m| m.copy_within(dest, src, len))
    }

    /// Allocates a block in the calling app's memory.
    pub fn mem_alloc(&self, size: u64) -> Result<u64, VmError> {
        self.engine.current_app()?.with_memory_mut(|m| m.alloc(size))
    }

    /// Frees a block in the calling app's memory.
    pub fn mem_free(&self, ptr: u64) -> Result<(), VmError> {
        self.engine.current_app()?.with_memory_mut(|m| m.free(ptr))
    }

    /// Resizes a block in the calling app's memory.
    pub fn mem_realloc(&self, ptr: u64, size: u64) -> Result<u64, VmError> {
        self.engine
            .current_app()?
            .with_memory_mut(|m| m.realloc(ptr, size))
    }

    /// Reads the NUL-terminated string at `ptr` (without the NUL).
    pub fn read_cstr(&self, ptr: u64) -> Result<Vec<u8>, VmError> {
        self.engine
            .current_app()?
            .with_memory(|m| Ok(m.cstr(ptr)?.to_vec()))
    }

    /// Length of the NUL-terminated string at `ptr`.
    pub fn cstr_len(&self, ptr: u64) -> Result<u64, VmError> {
        self.engine.current_app()?.with_memory(|m| m.cstr_len(ptr))
    }

    /// Allocates and writes `bytes` plus a terminating NUL into the calling
    /// app's memory; returns the new pointer.
    pub fn write_cstr(&self, bytes: &[u8]) -> Result<u64, VmError> {
        self.engine
            .current_app()?
            .with_memory_mut(|m| m.alloc_write_cstr(bytes))
    }

    // -------------------------------------------------------------------------
    // Engine services
    // -------------------------------------------------------------------------

    /// The per-run JSON document heap.
    pub fn json(&mut self) -> &mut JsonHeap {
        &mut self.engine.json
    }

    /// Read-only view of the JSON document heap.
    #[must_use]
    pub fn json_ref(&self) -> &JsonHeap {
        &self.engine.json
    }

    /// Moves value between accounts in the current frame's state view.
    pub fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
        let view = self.engine.current_ledger();
        transfer(view.as_ref(), from, to, amount)
    }

    /// Nested contract call. See [`Engine::call_contract`].
    pub fn call_contract(
        &mut self,
        to: Address,
        value: Option<U256>,
        input: Bytes,
    ) -> Result<u64, VmError> {
        self.engine.call_contract(to, value, input)
    }

    /// Nested delegate call. See [`Engine::delegate_call`].
    pub fn delegate_call(&mut self, code_addr: Address, input: Bytes) -> Result<u64, VmError> {
        self.engine.delegate_call(code_addr, input)
    }

    /// Destroys the executing contract and terminates the run.
    pub fn self_destruct(&mut self, beneficiary: Address) -> Result<(), VmError> {
        self.engine.self_destruct(beneficiary)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ledger::InMemoryLedger;
    use crate::ports::outbound::{ImportModule, ModuleInstance};

    struct StubInstance;

    impl ModuleInstance for StubInstance {
        fn has_export(&self, name: &str) -> bool {
            name == "main"
        }

        fn invoke(
            &self,
            _entry: &str,
            _args: &[u64],
            host: &mut dyn HostDispatch,
        ) -> Result<u64, VmError> {
            // One priced host call, then done.
            let idx = host
                .host_index("TC_GasLeft")
                .ok_or_else(|| VmError::UnknownCapability("TC_GasLeft".into()))?;
            host.call_host(idx, &[])
        }
    }

    struct StubLoader;

    impl ModuleLoader for StubLoader {
        fn load(
            &self,
            _code: &[u8],
            _imports: &ImportModule,
        ) -> Result<Box<dyn ModuleInstance>, LoadError> {
            Ok(Box::new(StubInstance))
        }
    }

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn engine(gas: u64, ledger: Arc<dyn Ledger>) -> Engine {
        Engine::new(
            Message::new(addr(1), addr(2), None, gas),
            Context::default(),
            ledger,
            Arc::new(StubLoader),
            Arc::new(EnvTable::with_defaults()),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_gas_limit_rejected() {
        let err = Engine::new(
            Message::new(addr(1), addr(2), None, 0),
            Context::default(),
            Arc::new(InMemoryLedger::new()),
            Arc::new(StubLoader),
            Arc::new(EnvTable::with_defaults()),
            EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VmError::ZeroGasLimit));
    }

    #[test]
    fn test_new_app_missing_code() {
        let mut eng = engine(10_000, Arc::new(InMemoryLedger::new()));
        let err = eng.new_app(addr(2), false).unwrap_err();
        assert!(matches!(err, VmError::Load(LoadError::CodeMissing(_))));
        // Load failure leaves the engine un-instantiated.
        assert_eq!(eng.state(), RunState::Created);
    }

    #[test]
    fn test_new_app_caches_and_reloads() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(2), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        let a = eng.new_app(addr(2), false).unwrap();
        let b = eng.new_app(addr(2), false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(eng.state(), RunState::Instantiated);

        let c = eng.new_app(addr(2), true).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_app_by_name() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(2), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        let app = eng.app_by_name(&addr(2).to_hex()).unwrap();
        assert_eq!(app.address(), addr(2));

        let err = eng.app_by_name("not-an-address").unwrap_err();
        assert!(matches!(err, VmError::BadPayload(_)));
    }

    #[test]
    fn test_run_lifecycle_and_gas() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(2), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        let app = eng.new_app(addr(2), false).unwrap();
        let ret = eng.run(&app, b"main|").unwrap();

        assert_eq!(eng.state(), RunState::Completed);
        // TC_GasLeft returned the budget minus its own charge.
        assert_eq!(ret, 10_000 - eng.gas_used());
        assert!(eng.gas_used() > 0);
    }

    #[test]
    fn test_run_unknown_entry_point() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(2), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        let app = eng.new_app(addr(2), false).unwrap();
        let err = eng.run(&app, b"nosuch|").unwrap_err();

        assert!(matches!(err, VmError::BadEntryPoint(ref name) if name == "nosuch"));
        assert_eq!(eng.state(), RunState::Faulted);
    }

    #[test]
    fn test_nested_call_needs_gas_to_enter() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(3), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        assert!(eng.gas.consume(10_000));

        // Zero remaining budget: the child frame is never entered.
        let err = eng
            .call_contract(addr(3), None, Bytes::from_slice(b"main|"))
            .unwrap_err();
        assert!(matches!(err, VmError::OutOfGas));
        assert_eq!(eng.gas_used(), 10_000);
    }

    #[test]
    fn test_run_strips_module_magic() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_code(addr(2), Bytes::from_slice(b"\0asm")).unwrap();

        let mut eng = engine(10_000, ledger);
        let app = eng.new_app(addr(2), false).unwrap();

        let mut input = MODULE_MAGIC.to_vec();
        input.extend_from_slice(b"main|x");
        eng.run(&app, &input).unwrap();
        assert_eq!(eng.state(), RunState::Completed);
    }
}
