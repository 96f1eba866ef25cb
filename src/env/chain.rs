//! # Chain-Interaction Capabilities
//!
//! Nested calls, value transfer, balance queries, events, and
//! self-destruction. All state effects go through the current frame's
//! buffered view, so they roll back with the frame on failure.

use crate::domain::services;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::env::gas_table::{
    log_cost, GAS_CALL_BASE, GAS_CALL_VALUE, GAS_EXT_STEP, GAS_SELFDESTRUCT,
};
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;
use tracing::debug;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

fn read_address(env: &CallEnv<'_>, ptr: u64) -> Result<Address, VmError> {
    let bytes = env.read_cstr(ptr)?;
    std::str::from_utf8(&bytes)
        .ok()
        .and_then(Address::from_hex)
        .ok_or_else(|| {
            VmError::BadPayload(format!(
                "invalid address: {:?}",
                String::from_utf8_lossy(&bytes)
            ))
        })
}

fn read_amount(env: &CallEnv<'_>, ptr: u64) -> Result<U256, VmError> {
    let bytes = env.read_cstr(ptr)?;
    let s = std::str::from_utf8(&bytes)
        .map_err(|_| VmError::BadPayload("amount is not valid utf-8".into()))?;
    U256::from_dec_str(s.trim())
        .map_err(|_| VmError::BadPayload(format!("invalid amount: {s:?}")))
}

/// Folds a child frame's outcome into the caller-visible result word.
///
/// On success the child's result is written into the caller's memory as a
/// decimal string and its pointer returned. A frame-local child failure
/// (revert, capability fault) returns NULL: the child's effects are already
/// discarded and its gas stays spent, but the calling contract regains
/// control and decides whether to continue. Whole-run terminators
/// (out-of-gas, exit, abort, host faults) keep unwinding.
fn child_result(env: &mut CallEnv<'_>, result: Result<u64, VmError>) -> Result<u64, VmError> {
    match result {
        Ok(ret) => env.write_cstr(ret.to_string().as_bytes()),
        Err(err) if err.ends_run() => Err(err),
        Err(err) => {
            debug!(error = %err, "nested call failed");
            Ok(0)
        }
    }
}

/// `TC_CallContract(address, input, value) -> ptr`
///
/// Runs the callee in a child frame against a child state view. `input` is
/// the callee's `action|payload` string; `value` is an optional decimal
/// amount (NULL pointer for none). The child's gas sub-budget is whatever
/// remains of the run budget. Returns a pointer to the child's decimal
/// result string, or NULL when the child frame failed.
pub struct CallContract;

impl HostFunc for CallContract {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let with_value = args.get(2).copied().unwrap_or(0) != 0;
        Ok(GAS_CALL_BASE + if with_value { GAS_CALL_VALUE } else { 0 })
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let to = read_address(env, arg(args, 0)?)?;
        let input = env.read_cstr(arg(args, 1)?)?;
        let value = match args.get(2).copied().unwrap_or(0) {
            0 => None,
            ptr => Some(read_amount(env, ptr)?),
        };
        let result = env.call_contract(to, value, Bytes::from_vec(input));
        child_result(env, result)
    }
}

/// `TC_DelegateCallContract(address, input) -> ptr`
///
/// Runs the target's code in a child frame while keeping this frame's
/// identity: sender, callee address, and value all stay. Same result
/// protocol as `TC_CallContract`.
pub struct DelegateCallContract;

impl HostFunc for DelegateCallContract {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_CALL_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let code_addr = read_address(env, arg(args, 0)?)?;
        let input = env.read_cstr(arg(args, 1)?)?;
        let result = env.delegate_call(code_addr, Bytes::from_vec(input));
        child_result(env, result)
    }
}

/// `TC_Transfer(to, amount)` - moves value from the executing contract.
pub struct Transfer;

impl HostFunc for Transfer {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_CALL_VALUE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let to = read_address(env, arg(args, 0)?)?;
        let amount = read_amount(env, arg(args, 1)?)?;
        let from = env.self_address();
        env.transfer(from, to, amount)?;
        Ok(0)
    }
}

/// `TC_GetBalance(address) -> ptr` (decimal string)
pub struct GetBalance;

impl HostFunc for GetBalance {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_EXT_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let address = read_address(env, arg(args, 0)?)?;
        let balance = env.ledger().get_balance(address)?;
        env.write_cstr(balance.to_string().as_bytes())
    }
}

/// `TC_SelfDestruct(beneficiary)`
///
/// Moves the contract's balance to the beneficiary, clears its code, marks
/// it destroyed, and terminates the run committing the current frame.
pub struct SelfDestruct;

impl HostFunc for SelfDestruct {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_SELFDESTRUCT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let beneficiary = read_address(env, arg(args, 0)?)?;
        env.self_destruct(beneficiary)?;
        // Unreachable: self_destruct terminates the run.
        Ok(0)
    }
}

/// `TC_Notify(topic, data)` - emits an event log entry.
///
/// Topic 0 is the keccak256 of the topic string; `data` is recorded raw.
pub struct Notify;

impl HostFunc for Notify {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let data_len = env.cstr_len(arg(args, 1)?)?;
        Ok(log_cost(1, data_len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let topic = env.read_cstr(arg(args, 0)?)?;
        let data = env.read_cstr(arg(args, 1)?)?;

        let entry = crate::domain::entities::LogEntry::new(
            env.self_address(),
            vec![services::keccak256(&topic)],
            Bytes::from_vec(data),
        );
        env.ledger().append_log(entry)?;
        Ok(0)
    }
}
