//! # JSON Capabilities
//!
//! Handle-based JSON documents for contracts. `TC_JsonParse` and
//! `TC_JsonNewObject` hand out opaque u64 handles into a per-run document
//! heap; getters and putters address fields by NUL-terminated key strings.
//! The heap is cleared at the end of every run, so handles never outlive
//! the run that created them.

use crate::domain::value_objects::{Address, U256};
use crate::env::gas_table::{json_cost, GAS_JSON_BASE};
use crate::env::HostFunc;
use crate::errors::VmError;
use crate::vm::engine::CallEnv;
use serde_json::{json, Value};

fn arg(args: &[u64], i: usize) -> Result<u64, VmError> {
    args.get(i)
        .copied()
        .ok_or_else(|| VmError::Internal(format!("missing host-call argument {i}")))
}

// =============================================================================
// DOCUMENT HEAP
// =============================================================================

/// Per-run heap of JSON documents, addressed by opaque handles.
///
/// Handle 0 is never valid; handles are `index + 1` into the document list.
#[derive(Debug, Default)]
pub struct JsonHeap {
    docs: Vec<Value>,
}

impl JsonHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `text` into a new document and returns its handle.
    pub fn parse(&mut self, text: &[u8]) -> Result<u64, VmError> {
        let value: Value = serde_json::from_slice(text)
            .map_err(|e| VmError::Json(format!("parse failed: {e}")))?;
        Ok(self.insert(value))
    }

    /// Creates an empty object document and returns its handle.
    pub fn new_object(&mut self) -> u64 {
        self.insert(json!({}))
    }

    /// Adds a document and returns its handle.
    pub fn insert(&mut self, value: Value) -> u64 {
        self.docs.push(value);
        self.docs.len() as u64
    }

    /// Resolves a handle to its document.
    pub fn get(&self, handle: u64) -> Result<&Value, VmError> {
        handle
            .checked_sub(1)
            .and_then(|i| self.docs.get(i as usize))
            .ok_or_else(|| VmError::Json(format!("invalid handle: {handle}")))
    }

    /// Resolves a handle to its document, mutably.
    pub fn get_mut(&mut self, handle: u64) -> Result<&mut Value, VmError> {
        handle
            .checked_sub(1)
            .and_then(|i| self.docs.get_mut(i as usize))
            .ok_or_else(|| VmError::Json(format!("invalid handle: {handle}")))
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true if no document is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Invalidates every handle. Called at the end of each run.
    pub fn clear(&mut self) {
        self.docs.clear();
    }
}

fn read_key(env: &CallEnv<'_>, ptr: u64) -> Result<String, VmError> {
    let bytes = env.read_cstr(ptr)?;
    String::from_utf8(bytes).map_err(|_| VmError::Json("key is not valid utf-8".into()))
}

fn field<'v>(doc: &'v Value, key: &str) -> Result<&'v Value, VmError> {
    doc.get(key)
        .ok_or_else(|| VmError::Json(format!("missing key: {key}")))
}

fn put(env: &mut CallEnv<'_>, handle: u64, key: String, value: Value) -> Result<u64, VmError> {
    let doc = env.json().get_mut(handle)?;
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| VmError::Json("document is not an object".into()))?;
    obj.insert(key, value);
    Ok(0)
}

// =============================================================================
// PARSE / CONSTRUCT
// =============================================================================

/// `TC_JsonParse(text) -> handle`
pub struct JsonParse;

impl HostFunc for JsonParse {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(json_cost(env.cstr_len(arg(args, 0)?)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let text = env.read_cstr(arg(args, 0)?)?;
        env.json().parse(&text)
    }
}

/// `TC_JsonNewObject() -> handle`
pub struct JsonNewObject;

impl HostFunc for JsonNewObject {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(env.json().new_object())
    }
}

/// `TC_JsonToString(handle) -> ptr`
pub struct JsonToString;

impl HostFunc for JsonToString {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let doc = env.json_ref().get(arg(args, 0)?)?;
        Ok(json_cost(doc.to_string().len() as u64))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let text = env.json_ref().get(arg(args, 0)?)?.to_string();
        env.write_cstr(text.as_bytes())
    }
}

// =============================================================================
// GETTERS
// =============================================================================

/// `TC_JsonGetInt(handle, key) -> i32`
pub struct JsonGetInt;

impl HostFunc for JsonGetInt {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_i64()
            .ok_or_else(|| VmError::Json(format!("key {key} is not an integer")))?;
        let value = i32::try_from(value)
            .map_err(|_| VmError::Json(format!("key {key} does not fit in int32")))?;
        Ok(i64::from(value) as u64)
    }
}

/// `TC_JsonGetInt64(handle, key) -> i64`
pub struct JsonGetInt64;

impl HostFunc for JsonGetInt64 {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_i64()
            .ok_or_else(|| VmError::Json(format!("key {key} is not an integer")))?;
        Ok(value as u64)
    }
}

/// `TC_JsonGetString(handle, key) -> ptr`
pub struct JsonGetString;

impl HostFunc for JsonGetString {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let len = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_str()
            .map_or(0, |s| s.len() as u64);
        Ok(json_cost(len))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_str()
            .ok_or_else(|| VmError::Json(format!("key {key} is not a string")))?
            .to_string();
        env.write_cstr(value.as_bytes())
    }
}

/// `TC_JsonGetAddress(handle, key) -> ptr` (normalized lowercase hex)
pub struct JsonGetAddress;

impl HostFunc for JsonGetAddress {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let raw = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_str()
            .ok_or_else(|| VmError::Json(format!("key {key} is not a string")))?;
        let address = Address::from_hex(raw)
            .ok_or_else(|| VmError::Json(format!("key {key} is not an address")))?;
        env.write_cstr(address.to_hex().as_bytes())
    }
}

/// `TC_JsonGetBigInt(handle, key) -> ptr` (decimal string)
pub struct JsonGetBigInt;

impl HostFunc for JsonGetBigInt {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?;

        // Accepted as either a decimal string or a JSON number.
        let rendered = match value {
            Value::String(s) => U256::from_dec_str(s.trim())
                .map_err(|_| VmError::Json(format!("key {key} is not a decimal bigint")))?
                .to_string(),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| VmError::Json(format!("key {key} is not an unsigned number")))?
                .to_string(),
            _ => return Err(VmError::Json(format!("key {key} is not a bigint"))),
        };
        env.write_cstr(rendered.as_bytes())
    }
}

/// `TC_JsonGetFloat(handle, key) -> f32 bits`
pub struct JsonGetFloat;

impl HostFunc for JsonGetFloat {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_f64()
            .ok_or_else(|| VmError::Json(format!("key {key} is not a number")))?;
        Ok(u64::from((value as f32).to_bits()))
    }
}

/// `TC_JsonGetDouble(handle, key) -> f64 bits`
pub struct JsonGetDouble;

impl HostFunc for JsonGetDouble {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = field(env.json_ref().get(arg(args, 0)?)?, &key)?
            .as_f64()
            .ok_or_else(|| VmError::Json(format!("key {key} is not a number")))?;
        Ok(value.to_bits())
    }
}

/// `TC_JsonGetObject(handle, key) -> handle` (sub-document copy)
pub struct JsonGetObject;

impl HostFunc for JsonGetObject {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let sub = field(env.json_ref().get(arg(args, 0)?)?, &key)?.clone();
        if !sub.is_object() {
            return Err(VmError::Json(format!("key {key} is not an object")));
        }
        Ok(env.json().insert(sub))
    }
}

// =============================================================================
// PUTTERS
// =============================================================================

/// `TC_JsonPutInt(handle, key, value)`
pub struct JsonPutInt;

impl HostFunc for JsonPutInt {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = arg(args, 2)? as u32 as i32;
        put(env, arg(args, 0)?, key, json!(value))
    }
}

/// `TC_JsonPutInt64(handle, key, value)`
pub struct JsonPutInt64;

impl HostFunc for JsonPutInt64 {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = arg(args, 2)? as i64;
        put(env, arg(args, 0)?, key, json!(value))
    }
}

/// `TC_JsonPutString(handle, key, value)`
pub struct JsonPutString;

impl HostFunc for JsonPutString {
    fn gas(&self, env: &CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        Ok(json_cost(env.cstr_len(arg(args, 2)?)?))
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = read_key(env, arg(args, 2)?)?;
        put(env, arg(args, 0)?, key, json!(value))
    }
}

/// `TC_JsonPutAddress(handle, key, value)` (validated, stored normalized)
pub struct JsonPutAddress;

impl HostFunc for JsonPutAddress {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let raw = read_key(env, arg(args, 2)?)?;
        let address = Address::from_hex(&raw)
            .ok_or_else(|| VmError::Json(format!("value for key {key} is not an address")))?;
        put(env, arg(args, 0)?, key, json!(address.to_hex()))
    }
}

/// `TC_JsonPutBigInt(handle, key, value)` (decimal string, validated)
pub struct JsonPutBigInt;

impl HostFunc for JsonPutBigInt {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let raw = read_key(env, arg(args, 2)?)?;
        let value = U256::from_dec_str(raw.trim())
            .map_err(|_| VmError::Json(format!("value for key {key} is not a decimal bigint")))?;
        put(env, arg(args, 0)?, key, json!(value.to_string()))
    }
}

/// `TC_JsonPutFloat(handle, key, f32 bits)`
pub struct JsonPutFloat;

impl HostFunc for JsonPutFloat {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = f32::from_bits(arg(args, 2)? as u32);
        put(env, arg(args, 0)?, key, json!(value))
    }
}

/// `TC_JsonPutDouble(handle, key, f64 bits)`
pub struct JsonPutDouble;

impl HostFunc for JsonPutDouble {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let value = f64::from_bits(arg(args, 2)?);
        put(env, arg(args, 0)?, key, json!(value))
    }
}

/// `TC_JsonPutObject(handle, key, child_handle)` (child copied in)
pub struct JsonPutObject;

impl HostFunc for JsonPutObject {
    fn gas(&self, _env: &CallEnv<'_>, _args: &[u64]) -> Result<u64, VmError> {
        Ok(GAS_JSON_BASE)
    }

    fn call(&self, env: &mut CallEnv<'_>, args: &[u64]) -> Result<u64, VmError> {
        let key = read_key(env, arg(args, 1)?)?;
        let child = env.json_ref().get(arg(args, 2)?)?.clone();
        put(env, arg(args, 0)?, key, child)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_parse_and_handles() {
        let mut heap = JsonHeap::new();
        let h = heap.parse(br#"{"num":100,"name":"xxxx"}"#).unwrap();
        assert_eq!(h, 1);

        let doc = heap.get(h).unwrap();
        assert_eq!(doc["num"], 100);
        assert_eq!(doc["name"], "xxxx");

        // Handle 0 is never valid.
        assert!(heap.get(0).is_err());
        assert!(heap.get(99).is_err());
    }

    #[test]
    fn test_heap_parse_malformed() {
        let mut heap = JsonHeap::new();
        let err = heap.parse(b"{not json").unwrap_err();
        assert!(matches!(err, VmError::Json(_)));
    }

    #[test]
    fn test_heap_clear_invalidates() {
        let mut heap = JsonHeap::new();
        let h = heap.parse(b"{}").unwrap();
        heap.clear();
        assert!(heap.get(h).is_err());
        assert!(heap.is_empty());
    }

    #[test]
    fn test_heap_mutation() {
        let mut heap = JsonHeap::new();
        let h = heap.new_object();
        heap.get_mut(h)
            .unwrap()
            .as_object_mut()
            .unwrap()
            .insert("k".into(), json!(7));
        assert_eq!(heap.get(h).unwrap().to_string(), r#"{"k":7}"#);
    }

    #[test]
    fn test_field_lookup() {
        let doc = json!({"a": 1});
        assert!(field(&doc, "a").is_ok());
        assert!(matches!(field(&doc, "b"), Err(VmError::Json(_))));
    }
}
