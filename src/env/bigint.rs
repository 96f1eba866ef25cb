//! # BigInt Capabilities
//!
//! 256-bit unsigned arithmetic over decimal strings stored in app memory.
//! Operands are NUL-terminated decimal strings; results come back the same
//! way. Overflow, division by zero, and malformed digits fault the run
//! with `VmError::Arithmetic`.

use crate::domain::value_objects::U256;
use crate::env::gas_table::GAS_BIGINT;
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

fn read_operand(env: &CallEnv<'_>, ptr: u64) -> Result<U256, VmError> {
    let bytes = env.read_cstr(ptr)?;
    let s = std::str::from_utf8(&bytes)
        .map_err(|_| VmError::Arithmetic("operand is not valid utf-8".into()))?;
    U256::from_dec_str(s.trim())
        .map_err(|_| VmError::Arithmetic(format!("malformed decimal operand: {s:?}")))
}

fn binary_op(
    env: &mut CallEnv<'_>,
    args: &[u64],
    op: impl FnOnce(U256, U256) -> Result<U256, VmError>,
) -> Result<u64, VmError> {
    let a = read_operand(env, arg(args, 0)?)?;
    let b = read_operand(env, arg(args, 1)?)?;
    let result = op(a, b)?;
    env.write_cstr(result.to_string().as_bytes())
}

/// `TC_BigIntAdd(a, b) -> ptr`
pub struct BigIntAdd;

impl HostFunc for BigIntAdd {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        binary_op(env, args, |a, b| {
            a.checked_add(b)
                .ok_or_else(|| VmError::Arithmetic("addition overflow".into()))
        })
    }
}

/// `TC_BigIntSub(a, b) -> ptr`
pub struct BigIntSub;

impl HostFunc for BigIntSub {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        binary_op(env, args, |a, b| {
            a.checked_sub(b)
                .ok_or_else(|| VmError::Arithmetic("subtraction underflow".into()))
        })
    }
}

/// `TC_BigIntMul(a, b) -> ptr`
pub struct BigIntMul;

impl HostFunc for BigIntMul {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        binary_op(env, args, |a, b| {
            a.checked_mul(b)
                .ok_or_else(|| VmError::Arithmetic("multiplication overflow".into()))
        })
    }
}

/// `TC_BigIntDiv(a, b) -> ptr`
pub struct BigIntDiv;

impl HostFunc for BigIntDiv {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        binary_op(env, args, |a, b| {
            a.checked_div(b)
                .ok_or_else(|| VmError::Arithmetic("division by zero".into()))
        })
    }
}

/// `TC_BigIntMod(a, b) -> ptr`
pub struct BigIntMod;

impl HostFunc for BigIntMod {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        binary_op(env, args, |a, b| {
            a.checked_rem(b)
                .ok_or_else(|| VmError::Arithmetic("modulo by zero".into()))
        })
    }
}

/// `TC_BigIntCmp(a, b) -> -1|0|1`
pub struct BigIntCmp;

impl HostFunc for BigIntCmp {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let a = read_operand(env, arg(args, 0)?)?;
        let b = read_operand(env, arg(args, 1)?)?;
        let ord: i64 = match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        };
        Ok(ord as u64)
    }
}

/// `TC_BigIntToInt64(a) -> i64`
///
/// Faults when the value does not fit a signed 64-bit integer.
pub struct BigIntToInt64;

impl HostFunc for BigIntToInt64 {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_BIGINT)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let a = read_operand(env, arg(args, 0)?)?;
        if a > U256::from(i64::MAX) {
            return Err(VmError::Arithmetic(format!(
                "value does not fit in int64: {a}"
            )));
        }
        Ok(a.low_u64())
    }
}
