//! # Crypto Capabilities
//!
//! Digest and signature-recovery host functions. Inputs arrive as
//! NUL-terminated strings in app memory; digests return a pointer to the
//! lowercase hex rendering of the result. All operations are pure and
//! deterministic; a malformed signature is reported to the contract, not
//! escalated into a fault.

use crate::domain::services;
use crate::domain::value_objects::Hash;
use crate::env::gas_table::{
    hash_cost, GAS_ECRECOVER, GAS_KECCAK_BASE, GAS_KECCAK_WORD, GAS_RIPEMD_BASE, GAS_RIPEMD_WORD,
    GAS_SHA256_BASE, GAS_SHA256_WORD,
};
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

fn hex_decode(s: &[u8]) -> Option<Vec<u8>> {
    let s = std::str::from_utf8(s).ok()?;
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// `TC_Ripemd160(data) -> ptr` (40 hex chars)
pub struct Ripemd160Func;

impl HostFunc for Ripemd160Func {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let len = env.cstr_len(arg(args, 0)?)?;
        Ok(hash_cost(GAS_RIPEMD_BASE, GAS_RIPEMD_WORD, len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let data = env.read_cstr(arg(args, 0)?)?;
        let digest = services::ripemd160(&data);
        env.write_cstr(services::to_hex(&digest).as_bytes())
    }
}

/// `TC_Sha256(data) -> ptr` (64 hex chars)
pub struct Sha256Func;

impl HostFunc for Sha256Func {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let len = env.cstr_len(arg(args, 0)?)?;
        Ok(hash_cost(GAS_SHA256_BASE, GAS_SHA256_WORD, len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let data = env.read_cstr(arg(args, 0)?)?;
        let digest = services::sha256(&data);
        env.write_cstr(services::to_hex(digest.as_bytes()).as_bytes())
    }
}

/// `TC_Keccak256(data) -> ptr` (64 hex chars)
pub struct Keccak256Func;

impl HostFunc for Keccak256Func {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let len = env.cstr_len(arg(args, 0)?)?;
        Ok(hash_cost(GAS_KECCAK_BASE, GAS_KECCAK_WORD, len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let data = env.read_cstr(arg(args, 0)?)?;
        let digest = services::keccak256(&data);
        env.write_cstr(services::to_hex(digest.as_bytes()).as_bytes())
    }
}

/// `TC_Ecrecover(hash, sig) -> ptr`
///
/// `hash` is the 32-byte message digest in hex; `sig` is the 65-byte
/// `r || s || v` signature in hex. Returns a pointer to the recovered
/// `0x`-prefixed address, or NULL when recovery fails.
pub struct Ecrecover;

impl HostFunc for Ecrecover {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_ECRECOVER)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let hash_str = env.read_cstr(arg(args, 0)?)?;
        let sig_str = env.read_cstr(arg(args, 1)?)?;

        let recovered = (|| {
            let hash = Hash::from_slice(&hex_decode(&hash_str)?)?;
            let sig = hex_decode(&sig_str)?;
            if sig.len() != 65 {
                return None;
            }
            let mut rs = [0u8; 64];
            rs.copy_from_slice(&sig[..64]);
            services::ecrecover(&hash, &rs, sig[64])
        })();

        match recovered {
            Some(address) => env.write_cstr(address.to_hex().as_bytes()),
            None => Ok(0),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode(b"0xff00"), Some(vec![0xff, 0x00]));
        assert_eq!(hex_decode(b"ff00"), Some(vec![0xff, 0x00]));
        assert_eq!(hex_decode(b"f"), None); // odd length
        assert_eq!(hex_decode(b"zz"), None); // bad digits
        assert_eq!(hex_decode(b""), Some(Vec::new()));
    }
}
