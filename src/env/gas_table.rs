//! # Gas Schedule
//!
//! Fixed prices and sizing helpers for the host capability families. Every
//! price is a pure function of the call arguments and the memory they
//! reference, so identical runs consume identical gas.

/// Cheapest host step (registry lookups, pure reads).
pub const GAS_QUICK_STEP: u64 = 2;

/// Simple computation over in-memory operands.
pub const GAS_FAST_STEP: u64 = 5;

/// Allocation and formatting work.
pub const GAS_MID_STEP: u64 = 8;

/// Control transfers and state reads.
pub const GAS_SLOW_STEP: u64 = 10;

/// State-touching steps (balance reads, log bookkeeping).
pub const GAS_EXT_STEP: u64 = 20;

/// Per 32-byte word copied or compared.
pub const GAS_COPY_WORD: u64 = 3;

/// Keccak-256: base + per-word.
pub const GAS_KECCAK_BASE: u64 = 30;
pub const GAS_KECCAK_WORD: u64 = 6;

/// SHA-256: base + per-word.
pub const GAS_SHA256_BASE: u64 = 60;
pub const GAS_SHA256_WORD: u64 = 12;

/// RIPEMD-160: base + per-word.
pub const GAS_RIPEMD_BASE: u64 = 600;
pub const GAS_RIPEMD_WORD: u64 = 120;

/// Signature recovery, flat.
pub const GAS_ECRECOVER: u64 = 3000;

/// Event emission: base + per-topic + per-data-byte.
pub const GAS_LOG_BASE: u64 = 375;
pub const GAS_LOG_TOPIC: u64 = 375;
pub const GAS_LOG_DATA_BYTE: u64 = 8;

/// Nested call setup.
pub const GAS_CALL_BASE: u64 = 700;

/// Surcharge for a nested call that transfers value.
pub const GAS_CALL_VALUE: u64 = 9000;

/// Self-destruct, flat.
pub const GAS_SELFDESTRUCT: u64 = 5000;

/// JSON capability: base + per-byte of parsed or serialized text.
pub const GAS_JSON_BASE: u64 = 20;
pub const GAS_JSON_BYTE: u64 = 1;

/// BigInt decimal-string arithmetic, flat per operation.
pub const GAS_BIGINT: u64 = 50;

/// Number of 32-byte words covering `len` bytes.
#[must_use]
pub const fn words(len: u64) -> u64 {
    len / 32 + (len % 32 != 0) as u64
}

/// Cost of copying or comparing `len` bytes.
#[must_use]
pub const fn copy_cost(len: u64) -> u64 {
    GAS_FAST_STEP + words(len) * GAS_COPY_WORD
}

/// Cost of hashing `len` bytes with the given base/word prices.
#[must_use]
pub const fn hash_cost(base: u64, word: u64, len: u64) -> u64 {
    base + words(len) * word
}

/// Cost of emitting a log with `topics` topics and `data_len` data bytes.
#[must_use]
pub const fn log_cost(topics: u64, data_len: u64) -> u64 {
    GAS_LOG_BASE + topics * GAS_LOG_TOPIC + data_len * GAS_LOG_DATA_BYTE
}

/// Cost of a JSON operation touching `len` bytes of text.
#[must_use]
pub const fn json_cost(len: u64) -> u64 {
    GAS_JSON_BASE + len * GAS_JSON_BYTE
}

// =============================================================================
// TESTS
// =============================================================================
