//! # Domain Services
//!
//! Pure, deterministic functions used by the crypto capability family and
//! by the engine itself. NO I/O, NO async, no side effects.

use crate::domain::value_objects::{Address, Hash};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

// =============================================================================
// DIGESTS
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// Computes SHA-256 hash of data.
#[must_use]
pub fn sha256(data: &[u8]) -> Hash {
    let hash = Sha256::digest(data);
    Hash::new(hash.into())
}

/// Computes RIPEMD-160 hash of data (20 bytes).
#[must_use]
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let hash = Ripemd160::digest(data);
    hash.into()
}

// =============================================================================
// SIGNATURE RECOVERY
// =============================================================================

/// Recovers the signer address from an ECDSA signature over `hash`.
///
/// `sig` is the 64-byte `r || s` pair; `rec_id` is the recovery id
/// (0/1 or the legacy 27/28 form). Returns `None` for malformed input
/// instead of failing the host.
#[must_use]
pub fn ecrecover(hash: &Hash, sig: &[u8; 64], rec_id: u8) -> Option<Address> {
    let normalized = if rec_id >= 27 { rec_id - 27 } else { rec_id };
    let rid = RecoveryId::from_byte(normalized)?;
    let signature = Signature::from_slice(sig).ok()?;
    let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, rid).ok()?;

    // Uncompressed point without the 0x04 tag byte.
    let point = key.to_encoded_point(false);
    Some(derive_address_from_pubkey(&point.as_bytes()[1..]))
}

/// Derives an address from an uncompressed public key (64 bytes, no 0x04
/// prefix): `keccak256(public_key)[12..]`.
#[must_use]
pub fn derive_address_from_pubkey(public_key: &[u8]) -> Address {
    let hash = Keccak256::digest(public_key);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

// =============================================================================
// HEX RENDERING
// =============================================================================

/// Lowercase hex rendering without prefix, used by the digest capabilities
/// to hand results back to contract memory as printable strings.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for byte in data {
        s.push_str(&format!("{byte:02x}"));
    }
    s
}

// =============================================================================
// TESTS
// =============================================================================
