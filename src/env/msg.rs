//! # Message and Context Capabilities
//!
//! Read-only views of the current call message and chain context. String
//! results are allocated into the calling app's memory as NUL-terminated
//! strings.

use crate::env::gas_table::{copy_cost, GAS_FAST_STEP, GAS_MID_STEP, GAS_QUICK_STEP};
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

/// `TC_GetMsgData() -> ptr` - the full `action|payload` input.
pub struct GetMsgData;

impl HostFunc for GetMsgData {
    fn gas(&self, env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(env.message().input.len() as u64))
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        let input = env.message().input.clone();
        env.write_cstr(input.as_slice())
    }
}

/// `TC_GetMsgGas() -> u64` - the frame's gas sub-budget.
pub struct GetMsgGas;

impl HostFunc for GetMsgGas {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(env.message().gas_limit)
    }
}

/// `TC_GetMsgSender() -> ptr` - hex address of the caller.
pub struct GetMsgSender;

impl HostFunc for GetMsgSender {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        let sender = env.message().sender.to_hex();
        env.write_cstr(sender.as_bytes())
    }
}

/// `TC_GetMsgSign() -> ptr` - the action selector of the current input.
pub struct GetMsgSign;

impl HostFunc for GetMsgSign {
    fn gas(&self, env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(env.message().action().len() as u64))
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        let action = env.message().action().to_vec();
        env.write_cstr(&action)
    }
}

/// `TC_GasLeft() -> u64` - remaining gas in the run budget.
pub struct GasLeft;

impl HostFunc for GasLeft {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(env.gas_left())
    }
}

/// `TC_GetSelfAddress() -> ptr` - hex address the executing code is bound to.
///
/// Under a delegate call this is the caller's identity, not the address the
/// code was loaded from.
pub struct GetSelfAddress;

impl HostFunc for GetSelfAddress {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        let addr = env.self_address().to_hex();
        env.write_cstr(addr.as_bytes())
    }
}

/// `TC_IsHexAddress(s) -> 0|1`
pub struct IsHexAddress;

impl HostFunc for IsHexAddress {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_FAST_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let bytes = env.read_cstr(arg(args, 0)?)?;
        let ok = std::str::from_utf8(&bytes)
            .map(crate::domain::value_objects::is_hex_address)
            .unwrap_or(false);
        Ok(u64::from(ok))
    }
}

/// `TC_Payable() -> 0|1` - whether the message carries value.
pub struct Payable;

impl HostFunc for Payable {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(u64::from(env.message().value.is_some()))
    }
}
