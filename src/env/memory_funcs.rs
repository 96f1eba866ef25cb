//! # Memory and String Capabilities
//!
//! C-style allocator and string functions executing against the calling
//! app's linear memory. Pointers are byte offsets into that memory; a NULL
//! pointer is offset 0. Every access is bounds-checked by the memory layer,
//! so a stray pointer faults the run instead of touching host memory.

use crate::env::gas_table::{copy_cost, GAS_FAST_STEP, GAS_MID_STEP, GAS_QUICK_STEP};
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;
use tracing::info;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

/// Sign-extends a C `int`-style comparison result into the u64 return slot.
fn ret_i64(v: i64) -> u64 {
    v as u64
}

// =============================================================================
// ALLOCATOR
// =============================================================================

/// `malloc(size) -> ptr`
pub struct Malloc;

impl HostFunc for Malloc {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP + copy_cost(arg(args, 0)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        env.mem_alloc(arg(args, 0)?)
    }
}

/// `calloc(count, size) -> ptr` (zeroed)
pub struct Calloc;

impl HostFunc for Calloc {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let total = arg(args, 0)?.saturating_mul(arg(args, 1)?);
        Ok(GAS_MID_STEP + copy_cost(total))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let total = arg(args, 0)?
            .checked_mul(arg(args, 1)?)
            .ok_or_else(|| VmError::Arithmetic("calloc size overflow".into()))?;
        let ptr = env.mem_alloc(total)?;
        if ptr != 0 {
            env.mem_fill(ptr, total, 0)?;
        }
        Ok(ptr)
    }
}

/// `realloc(ptr, size) -> ptr`
pub struct Realloc;

impl HostFunc for Realloc {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP + copy_cost(arg(args, 1)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        env.mem_realloc(arg(args, 0)?, arg(args, 1)?)
    }
}

/// `free(ptr)`
pub struct Free;

impl HostFunc for Free {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_QUICK_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        env.mem_free(arg(args, 0)?)?;
        Ok(0)
    }
}

// =============================================================================
// MEMORY OPS
// =============================================================================

/// `memcpy(dest, src, n) -> dest`
pub struct Memcpy;

impl HostFunc for Memcpy {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(arg(args, 2)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let (dest, src, n) = (arg(args, 0)?, arg(args, 1)?, arg(args, 2)?);
        env.mem_copy(dest, src, n)?;
        Ok(dest)
    }
}

/// `memmove(dest, src, n) -> dest` (overlap-safe, same implementation)
pub struct Memmove;

impl HostFunc for Memmove {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(arg(args, 2)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let (dest, src, n) = (arg(args, 0)?, arg(args, 1)?, arg(args, 2)?);
        env.mem_copy(dest, src, n)?;
        Ok(dest)
    }
}

/// `memset(dest, byte, n) -> dest`
pub struct Memset;

impl HostFunc for Memset {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(arg(args, 2)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let (dest, byte, n) = (arg(args, 0)?, arg(args, 1)?, arg(args, 2)?);
        env.mem_fill(dest, n, byte as u8)?;
        Ok(dest)
    }
}

/// `memcmp(a, b, n) -> <0|0|>0`
pub struct Memcmp;

impl HostFunc for Memcmp {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(arg(args, 2)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let n = arg(args, 2)?;
        let a = env.mem_read(arg(args, 0)?, n)?;
        let b = env.mem_read(arg(args, 1)?, n)?;
        Ok(ret_i64(match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }))
    }
}

// =============================================================================
// STRING OPS
// =============================================================================

/// `strcmp(a, b) -> <0|0|>0`
pub struct Strcmp;

impl HostFunc for Strcmp {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let len = env.cstr_len(arg(args, 0)?)?.max(env.cstr_len(arg(args, 1)?)?);
        Ok(copy_cost(len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let a = env.read_cstr(arg(args, 0)?)?;
        let b = env.read_cstr(arg(args, 1)?)?;
        Ok(ret_i64(match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }))
    }
}

/// `strcpy(dest, src) -> dest`
pub struct Strcpy;

impl HostFunc for Strcpy {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(env.cstr_len(arg(args, 1)?)? + 1))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let dest = arg(args, 0)?;
        let mut src = env.read_cstr(arg(args, 1)?)?;
        src.push(0);
        env.mem_write(dest, &src)?;
        Ok(dest)
    }
}

/// `strlen(s) -> len`
pub struct Strlen;

impl HostFunc for Strlen {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(env.cstr_len(arg(args, 0)?)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        env.cstr_len(arg(args, 0)?)
    }
}

/// `strconcat(a, b) -> ptr` (newly allocated `a + b`)
pub struct Strconcat;

impl HostFunc for Strconcat {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let len = env.cstr_len(arg(args, 0)?)? + env.cstr_len(arg(args, 1)?)?;
        Ok(GAS_MID_STEP + copy_cost(len + 1))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let mut joined = env.read_cstr(arg(args, 0)?)?;
        joined.extend(env.read_cstr(arg(args, 1)?)?);
        env.write_cstr(&joined)
    }
}

// =============================================================================
// NUMERIC CONVERSION
// =============================================================================

/// `atoi(s) -> i32` (0 on parse failure, C semantics)
pub struct Atoi;

impl HostFunc for Atoi {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_FAST_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let s = env.read_cstr(arg(args, 0)?)?;
        let parsed = std::str::from_utf8(&s)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(0);
        Ok(ret_i64(i64::from(parsed)))
    }
}

/// `atoi64(s) -> i64` (0 on parse failure)
pub struct Atoi64;

impl HostFunc for Atoi64 {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_FAST_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let s = env.read_cstr(arg(args, 0)?)?;
        let parsed = std::str::from_utf8(&s)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0);
        Ok(ret_i64(parsed))
    }
}

/// `itoa(value) -> ptr` (decimal rendering of an i32)
pub struct Itoa;

impl HostFunc for Itoa {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let value = arg(args, 0)? as u32 as i32;
        env.write_cstr(value.to_string().as_bytes())
    }
}

/// `i64toa(value) -> ptr` (decimal rendering of an i64)
pub struct I64toa;

impl HostFunc for I64toa {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_MID_STEP)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let value = arg(args, 0)? as i64;
        env.write_cstr(value.to_string().as_bytes())
    }
}

// =============================================================================
// DEBUG OUTPUT
// =============================================================================

/// `prints_l(ptr, len)` - logs a length-delimited string.
pub struct PrintsL;

impl HostFunc for PrintsL {
    fn gas(&self, _env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(arg(args, 1)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let bytes = env.mem_read(arg(args, 0)?, arg(args, 1)?)?;
        info!(target: "contract", app = %env.self_address(), "{}", String::from_utf8_lossy(&bytes));
        Ok(0)
    }
}

/// `TC_Prints(ptr)` - logs a NUL-terminated string.
pub struct Prints;

impl HostFunc for Prints {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(copy_cost(env.cstr_len(arg(args, 0)?)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let bytes = env.read_cstr(arg(args, 0)?)?;
        info!(target: "contract", app = %env.self_address(), "{}", String::from_utf8_lossy(&bytes));
        Ok(0)
    }
}
