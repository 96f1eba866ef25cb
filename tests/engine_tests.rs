//! End-to-end engine scenarios: deployment framing, frame atomicity across
//! reverts and nested calls, gas exhaustion, link-time import checks, app
//! cache behavior, and gas determinism.

use contract_engine::prelude::*;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn module_code(tag: &str) -> Vec<u8> {
    let mut code = deploy::MODULE_MAGIC.to_vec();
    code.extend_from_slice(tag.as_bytes());
    code
}

fn call(host: &mut dyn HostDispatch, name: &str, args: &[u64]) -> Result<u64, VmError> {
    let idx = host
        .host_index(name)
        .ok_or_else(|| VmError::UnknownCapability(name.to_string()))?;
    host.call_host(idx, args)
}

/// Allocates `s` as a NUL-terminated string in the calling app's memory.
fn put_cstr(host: &mut dyn HostDispatch, s: &str) -> Result<u64, VmError> {
    let ptr = call(host, "malloc", &[s.len() as u64 + 1])?;
    host.write_memory(ptr, s.as_bytes())?;
    host.write_memory(ptr + s.len() as u64, &[0])?;
    Ok(ptr)
}

fn read_cstr(host: &mut dyn HostDispatch, ptr: u64) -> Result<Vec<u8>, VmError> {
    let len = call(host, "strlen", &[ptr])?;
    host.read_memory(ptr, len)
}

struct Fixture {
    ledger: Arc<InMemoryLedger>,
    loader: Arc<ScriptLoader>,
    env: Arc<EnvTable>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        Self {
            ledger: Arc::new(InMemoryLedger::new()),
            loader: Arc::new(ScriptLoader::new()),
            env: Arc::new(EnvTable::with_defaults()),
        }
    }

    fn install(&self, address: Address, tag: &str, module: ScriptModule) {
        let code = module_code(tag);
        self.loader.register(&code, module);
        self.ledger
            .set_code(address, Bytes::from_vec(code))
            .unwrap();
    }

    fn engine(&self, message: Message) -> Engine {
        Engine::new(
            message,
            Context::default(),
            Arc::clone(&self.ledger) as Arc<dyn Ledger>,
            Arc::clone(&self.loader) as Arc<dyn ModuleLoader>,
            Arc::clone(&self.env),
            EngineConfig::default(),
        )
        .unwrap()
    }
}

// =============================================================================
// DEPLOYMENT
// =============================================================================

#[test]
fn deploy_payload_feeds_init_entry_point() {
    let fx = Fixture::new();
    let code = module_code("hello");

    // Framed payload: init args + module bytes.
    let payload = deploy::encode(br#"{"num":100,"name":"xxxx"}"#, &code).unwrap();
    let decoded = deploy::decode(&payload).unwrap();
    assert_eq!(
        decoded.init_input,
        br#"Init|{"num":100,"name":"xxxx"}"#.to_vec()
    );
    assert_eq!(decoded.code, code);

    // Init parses its JSON args and returns the "num" field.
    fx.loader.register(
        &code,
        ScriptModule::new().export("Init", |host, args| {
            let handle = call(host, "TC_JsonParse", &[args[0]])?;
            let key = put_cstr(host, "num")?;
            call(host, "TC_JsonGetInt", &[handle, key])
        }),
    );
    fx.ledger
        .set_code(addr(2), Bytes::from_vec(decoded.code))
        .unwrap();

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let ret = engine.run(&app, &decoded.init_input).unwrap();

    assert_eq!(ret, 100);
    assert_eq!(engine.state(), RunState::Completed);
}

// =============================================================================
// FRAME ATOMICITY
// =============================================================================

#[test]
fn revert_rolls_back_value_transfer() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(1), U256::from(1000)).unwrap();
    fx.install(
        addr(2),
        "reverter",
        ScriptModule::new().export("pay", |host, _| {
            let reason = put_cstr(host, "no thanks")?;
            call(host, "TC_RevertWithMsg", &[reason])
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), Some(U256::from(100)), 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let err = engine.run(&app, b"pay|").unwrap_err();

    assert!(matches!(err, VmError::Revert(ref r) if r == "no thanks"));
    assert_eq!(engine.state(), RunState::Reverted);
    // The buffered value transfer never reached the ledger.
    assert_eq!(fx.ledger.get_balance(addr(1)).unwrap(), U256::from(1000));
    assert_eq!(fx.ledger.get_balance(addr(2)).unwrap(), U256::zero());
    // Gas consumed before the revert stays spent.
    assert!(engine.gas_used() > 0);
}

#[test]
fn exit_commits_but_abort_discards() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(2), U256::from(500)).unwrap();
    fx.install(
        addr(2),
        "teller",
        ScriptModule::new()
            .export("give_exit", |host, _| {
                let to = put_cstr(host, &addr(3).to_hex())?;
                let amount = put_cstr(host, "25")?;
                call(host, "TC_Transfer", &[to, amount])?;
                call(host, "exit", &[7])
            })
            .export("give_abort", |host, _| {
                let to = put_cstr(host, &addr(3).to_hex())?;
                let amount = put_cstr(host, "25")?;
                call(host, "TC_Transfer", &[to, amount])?;
                call(host, "abort", &[])
            }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();

    // exit(7): run completes with the exit code, transfer committed.
    let ret = engine.run(&app, b"give_exit|").unwrap();
    assert_eq!(ret, 7);
    assert_eq!(engine.state(), RunState::Completed);
    assert_eq!(fx.ledger.get_balance(addr(3)).unwrap(), U256::from(25));

    // abort: transfer discarded, gas still consumed.
    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let err = engine.run(&app, b"give_abort|").unwrap_err();
    assert!(matches!(err, VmError::Abort));
    assert_eq!(engine.state(), RunState::Faulted);
    assert_eq!(fx.ledger.get_balance(addr(3)).unwrap(), U256::from(25)); // unchanged
    assert!(engine.gas_used() > 0);
}

#[test]
fn nested_call_failure_rolls_back_with_gas_spent() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(2), U256::from(100)).unwrap();

    // Callee burns some gas, then reverts.
    fx.install(
        addr(3),
        "bomb",
        ScriptModule::new().export("boom", |host, _| {
            let data = put_cstr(host, "some data to hash for gas")?;
            call(host, "TC_Keccak256", &[data])?;
            call(host, "TC_Revert", &[])
        }),
    );
    // Caller moves value first, then makes the doomed call and chooses to
    // fail the whole run when the child comes back empty-handed.
    fx.install(
        addr(2),
        "caller",
        ScriptModule::new().export("main", |host, _| {
            let to = put_cstr(host, &addr(4).to_hex())?;
            let amount = put_cstr(host, "10")?;
            call(host, "TC_Transfer", &[to, amount])?;

            let callee = put_cstr(host, &addr(3).to_hex())?;
            let input = put_cstr(host, "boom|")?;
            let ret = call(host, "TC_CallContract", &[callee, input, 0])?;
            if ret == 0 {
                return call(host, "TC_Revert", &[]);
            }
            Ok(ret)
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let err = engine.run(&app, b"main|").unwrap_err();

    assert!(err.is_revert());
    assert_eq!(engine.state(), RunState::Reverted);
    // Neither the caller's transfer nor anything from the callee landed.
    assert_eq!(fx.ledger.get_balance(addr(2)).unwrap(), U256::from(100));
    assert_eq!(fx.ledger.get_balance(addr(4)).unwrap(), U256::zero());
    // The child's hashing gas stays spent on the shared counter.
    assert!(engine.gas_used() > 3000);
}

#[test]
fn parent_continues_after_reverting_child() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(2), U256::from(100)).unwrap();
    fx.ledger.add_balance(addr(3), U256::from(5)).unwrap();
    fx.install(
        addr(3),
        "refuser",
        ScriptModule::new().export("take", |host, _| {
            let to = put_cstr(host, &addr(5).to_hex())?;
            let amount = put_cstr(host, "5")?;
            call(host, "TC_Transfer", &[to, amount])?;
            call(host, "TC_Revert", &[])
        }),
    );
    // Caller treats the failed child as a soft error and keeps going.
    fx.install(
        addr(2),
        "optimist",
        ScriptModule::new().export("main", |host, _| {
            let callee = put_cstr(host, &addr(3).to_hex())?;
            let input = put_cstr(host, "take|")?;
            let ret = call(host, "TC_CallContract", &[callee, input, 0])?;

            let to = put_cstr(host, &addr(4).to_hex())?;
            let amount = put_cstr(host, "10")?;
            call(host, "TC_Transfer", &[to, amount])?;
            Ok(u64::from(ret == 0))
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let ret = engine.run(&app, b"main|").unwrap();

    // The caller observed the child's failure and still completed.
    assert_eq!(ret, 1);
    assert_eq!(engine.state(), RunState::Completed);
    // The child's transfer rolled back; the caller's own transfer landed.
    assert_eq!(fx.ledger.get_balance(addr(2)).unwrap(), U256::from(90));
    assert_eq!(fx.ledger.get_balance(addr(3)).unwrap(), U256::from(5));
    assert_eq!(fx.ledger.get_balance(addr(5)).unwrap(), U256::zero());
    assert_eq!(fx.ledger.get_balance(addr(4)).unwrap(), U256::from(10));
}

#[test]
fn out_of_gas_aborts_with_ledger_unchanged() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(2), U256::from(100)).unwrap();
    fx.install(
        addr(2),
        "spender",
        ScriptModule::new().export("main", |host, _| {
            let to = put_cstr(host, &addr(3).to_hex())?;
            let amount = put_cstr(host, "10")?;
            call(host, "TC_Transfer", &[to, amount])?;
            // Keep hashing until the budget runs dry.
            let data = put_cstr(host, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")?;
            loop {
                call(host, "TC_Keccak256", &[data])?;
            }
        }),
    );

    let limit = 15_000;
    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, limit));
    let app = engine.new_app(addr(2), false).unwrap();
    let err = engine.run(&app, b"main|").unwrap_err();

    assert!(matches!(err, VmError::OutOfGas));
    assert_eq!(engine.state(), RunState::OutOfGas);
    assert!(engine.gas_used() <= limit);
    assert_eq!(fx.ledger.get_balance(addr(3)).unwrap(), U256::zero());
}

// =============================================================================
// LINKING
// =============================================================================

#[test]
fn unknown_import_fails_at_link_time() {
    let fx = Fixture::new();
    fx.install(
        addr(2),
        "bad-imports",
        ScriptModule::new()
            .export("main", |_, _| Ok(0))
            .import("TC_NotACapability"),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let err = engine.new_app(addr(2), false).unwrap_err();

    assert!(matches!(
        err,
        VmError::Load(LoadError::UnknownImport { ref name, .. }) if name == "TC_NotACapability"
    ));
    // Failed before instantiation and before any gas was charged.
    assert_eq!(engine.state(), RunState::Created);
    assert_eq!(engine.gas_used(), 0);
}

// =============================================================================
// APP CACHE AND MEMORY PERSISTENCE
// =============================================================================

#[test]
fn cached_app_keeps_heap_until_force_reload() {
    let fx = Fixture::new();
    fx.install(
        addr(2),
        "alloc",
        ScriptModule::new().export("grab", |host, _| call(host, "malloc", &[64])),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 1_000_000));
    let app = engine.new_app(addr(2), false).unwrap();

    let first = engine.run(&app, b"grab|").unwrap();
    let second = engine.run(&app, b"grab|").unwrap();
    // Same cached instance: the second allocation lands past the first.
    assert_ne!(first, second);

    // A force-reloaded app starts from a fresh memory image.
    let fresh = engine.new_app(addr(2), true).unwrap();
    let again = engine.run(&fresh, b"grab|").unwrap();
    assert_eq!(again, first);
}

// =============================================================================
// DELEGATE CALLS
// =============================================================================

#[test]
fn delegate_call_preserves_identity() {
    let fx = Fixture::new();

    // Library answers 1 when it is acting as addr(2)'s identity.
    let expected = addr(2).to_hex();
    fx.install(
        addr(9),
        "lib",
        ScriptModule::new().export("who", move |host, _| {
            let ptr = call(host, "TC_GetSelfAddress", &[])?;
            let own = read_cstr(host, ptr)?;
            Ok(u64::from(own == expected.as_bytes()))
        }),
    );
    fx.install(
        addr(2),
        "proxy",
        ScriptModule::new()
            .export("via_delegate", |host, _| {
                let target = put_cstr(host, &addr(9).to_hex())?;
                let input = put_cstr(host, "who|")?;
                let ret = call(host, "TC_DelegateCallContract", &[target, input])?;
                call(host, "atoi", &[ret])
            })
            .export("via_call", |host, _| {
                let target = put_cstr(host, &addr(9).to_hex())?;
                let input = put_cstr(host, "who|")?;
                let ret = call(host, "TC_CallContract", &[target, input, 0])?;
                call(host, "atoi", &[ret])
            }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 1_000_000));
    let app = engine.new_app(addr(2), false).unwrap();

    // Delegate call: the library sees the proxy's identity.
    assert_eq!(engine.run(&app, b"via_delegate|").unwrap(), 1);
    // Plain call: the library sees its own address.
    assert_eq!(engine.run(&app, b"via_call|").unwrap(), 0);
}

#[test]
fn delegate_call_moves_value_exactly_once() {
    let fx = Fixture::new();
    // The sender holds exactly the amount being sent.
    fx.ledger.add_balance(addr(1), U256::from(100)).unwrap();
    fx.install(
        addr(9),
        "lib-noop",
        ScriptModule::new().export("touch", |_, _| Ok(1)),
    );
    fx.install(
        addr(2),
        "fwd-proxy",
        ScriptModule::new().export("fwd", |host, _| {
            let target = put_cstr(host, &addr(9).to_hex())?;
            let input = put_cstr(host, "touch|")?;
            call(host, "TC_DelegateCallContract", &[target, input])
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), Some(U256::from(100)), 1_000_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let ret = engine.run(&app, b"fwd|").unwrap();

    // The delegate hop succeeded; it did not re-run the sender's transfer.
    assert_ne!(ret, 0);
    assert_eq!(engine.state(), RunState::Completed);
    assert_eq!(fx.ledger.get_balance(addr(1)).unwrap(), U256::zero());
    assert_eq!(fx.ledger.get_balance(addr(2)).unwrap(), U256::from(100));
    assert_eq!(fx.ledger.get_balance(addr(9)).unwrap(), U256::zero());
}

// =============================================================================
// SELF-DESTRUCT AND EVENTS
// =============================================================================

#[test]
fn self_destruct_moves_balance_and_clears_code() {
    let fx = Fixture::new();
    fx.ledger.add_balance(addr(2), U256::from(500)).unwrap();
    fx.install(
        addr(2),
        "mortal",
        ScriptModule::new().export("die", |host, _| {
            let beneficiary = put_cstr(host, &addr(9).to_hex())?;
            call(host, "TC_SelfDestruct", &[beneficiary])
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    let ret = engine.run(&app, b"die|").unwrap();

    assert_eq!(ret, 0);
    assert_eq!(engine.state(), RunState::Completed);
    assert_eq!(fx.ledger.get_balance(addr(9)).unwrap(), U256::from(500));
    assert_eq!(fx.ledger.get_balance(addr(2)).unwrap(), U256::zero());
    assert!(fx.ledger.get_code(addr(2)).unwrap().is_empty());
    assert!(fx.ledger.is_destroyed(addr(2)).unwrap());
}

#[test]
fn notify_appends_committed_log() {
    let fx = Fixture::new();
    fx.install(
        addr(2),
        "emitter",
        ScriptModule::new().export("emit", |host, _| {
            let topic = put_cstr(host, "Transfer")?;
            let data = put_cstr(host, "40 units")?;
            call(host, "TC_Notify", &[topic, data])
        }),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();
    engine.run(&app, b"emit|").unwrap();

    let logs = fx.ledger.logs().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, addr(2));
    assert_eq!(logs[0].topics, vec![keccak256(b"Transfer")]);
    assert_eq!(logs[0].data.as_slice(), b"40 units");
}

// =============================================================================
// RESULT REPORTING
// =============================================================================

#[test]
fn run_report_summarizes_outcome() {
    let fx = Fixture::new();
    fx.install(
        addr(2),
        "reporter",
        ScriptModule::new()
            .export("ok", |_, _| Ok(5))
            .export("bad", |host, _| call(host, "TC_Revert", &[])),
    );

    let mut engine = fx.engine(Message::new(addr(1), addr(2), None, 100_000));
    let app = engine.new_app(addr(2), false).unwrap();

    let report = engine.run_report(&app, b"ok|");
    assert!(report.success());
    assert_eq!(report.ret, 5);
    assert!(report.error.is_none());

    let report = engine.run_report(&app, b"bad|");
    assert!(!report.success());
    assert_eq!(report.state, RunState::Reverted);
    assert!(report.error.as_deref().unwrap().contains("revert"));
    assert!(report.gas_used > 0);
}

// =============================================================================
// DETERMINISM
// =============================================================================

#[test]
fn identical_runs_consume_identical_gas() {
    let build = || {
        let fx = Fixture::new();
        fx.ledger.add_balance(addr(1), U256::from(1000)).unwrap();
        fx.install(
            addr(2),
            "worker",
            ScriptModule::new().export("work", |host, args| {
                let data = put_cstr(host, "deterministic input")?;
                let digest = call(host, "TC_Sha256", &[data])?;
                let a = put_cstr(host, "340282366920938463463374607431768211456")?;
                let b = put_cstr(host, "42")?;
                call(host, "TC_BigIntMul", &[a, b])?;
                call(host, "strlen", &[digest])?;
                Ok(args[1])
            }),
        );
        fx
    };

    let run_once = |fx: &Fixture| {
        let mut engine = fx.engine(Message::new(addr(1), addr(2), Some(U256::from(5)), 100_000));
        let app = engine.new_app(addr(2), false).unwrap();
        engine.run(&app, b"work|payload").unwrap();
        engine.gas_used()
    };

    let fx1 = build();
    let fx2 = build();
    assert_eq!(run_once(&fx1), run_once(&fx2));
}
