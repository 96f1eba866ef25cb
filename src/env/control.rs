//! # Control-Flow Capabilities
//!
//! Termination and condition checks. `exit` commits the current frame's
//! buffered effects on the way out; `abort`, reverts, and failed checks
//! discard them. Gas consumed up to the point of termination stays spent.

use crate::env::gas_table::GAS_QUICK_STEP;
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

fn read_message(env: &CallEnv<'_>, ptr: u64) -> Result<String, VmError> {
    let bytes = env.read_cstr(ptr)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `exit(code)` - terminates the run, committing the current frame.
pub struct Exit;

impl HostFunc for Exit {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, _env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Err(VmError::Exit(arg(args, 0)?))
    }
}

/// `abort()` - terminates the run without committing the current frame.
pub struct Abort;

impl HostFunc for Abort {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, _env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Err(VmError::Abort)
    }
}

/// `TC_Assert(cond)` - reverts when `cond` is zero.
pub struct Assert;

impl HostFunc for Assert {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, _env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        if arg(args, 0)? == 0 {
            return Err(VmError::Revert("assert failed".into()));
        }
        Ok(0)
    }
}

/// `TC_Require(cond)` - reverts when `cond` is zero.
pub struct Require;

impl HostFunc for Require {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, _env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        if arg(args, 0)? == 0 {
            return Err(VmError::Revert("require failed".into()));
        }
        Ok(0)
    }
}

/// `TC_RequireWithMsg(cond, msg)` - reverts with the given reason.
pub struct RequireWithMsg;

impl HostFunc for RequireWithMsg {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        if arg(args, 0)? == 0 {
            let reason = read_message(env, arg(args, 1)?)?;
            return Err(VmError::Revert(reason));
        }
        Ok(0)
    }
}

/// `TC_Revert()` - unconditional revert.
pub struct Revert;

impl HostFunc for Revert {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, _env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Err(VmError::Revert("revert".into()))
    }
}

/// `TC_RevertWithMsg(msg)` - unconditional revert with a reason.
pub struct RevertWithMsg;

impl HostFunc for RevertWithMsg {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let reason = read_message(env, arg(args, 0)?)?;
        Err(VmError::Revert(reason))
    }
}
