//! # Deployment Payload Framing
//!
//! A deployment payload packs constructor arguments and module bytes into
//! one byte stream:
//!
//! ```text
//! [4-byte module magic][4-byte deploy tag]["len" u16 BE][init args][code]
//! ```
//!
//! Decoding splits it back into the `Init|<args>` constructor input and the
//! raw module bytes.

use crate::errors::VmError;

/// Module magic prefix (`\0asm`).
pub const MODULE_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Tag marking a framed deployment payload.
pub const DEPLOY_TAG: [u8; 4] = *b"XLTC";

/// Entry point invoked on deployment.
pub const INIT_ACTION: &str = "Init";

/// Header size: magic + tag + u16 length.
const HEADER_LEN: usize = 10;

/// A decoded deployment payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployPayload {
    /// Constructor input, already framed as `Init|<args>`.
    pub init_input: Vec<u8>,
    /// The module bytes to store and instantiate.
    pub code: Vec<u8>,
}

/// Encodes constructor args and module bytes into a framed payload.
///
/// # Errors
///
/// `BadPayload` if `args` exceeds the u16 length field.
pub fn encode(args: &[u8], code: &[u8]) -> Result<Vec<u8>, VmError> {
    let len = u16::try_from(args.len())
        .map_err(|_| VmError::BadPayload(format!("init args too long: {} bytes", args.len())))?;

    let mut out = Vec::with_capacity(HEADER_LEN + args.len() + code.len());
    out.extend_from_slice(&MODULE_MAGIC);
    out.extend_from_slice(&DEPLOY_TAG);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(args);
    out.extend_from_slice(code);
    Ok(out)
}

/// Decodes a framed deployment payload.
///
/// Payloads without the deploy tag are treated as bare module bytes with
/// empty constructor args.
///
/// # Errors
///
/// `BadPayload` if the stream is truncated or the length field overruns it.
pub fn decode(payload: &[u8]) -> Result<DeployPayload, VmError> {
    if payload.len() < MODULE_MAGIC.len() || payload[..4] != MODULE_MAGIC {
        return Err(VmError::BadPayload("missing module magic".into()));
    }

    // Bare module: no deploy tag after the magic.
    if payload.len() < HEADER_LEN || payload[4..8] != DEPLOY_TAG {
        return Ok(DeployPayload {
            init_input: format!("{INIT_ACTION}|").into_bytes(),
            code: payload.to_vec(),
        });
    }

    let len = u16::from_be_bytes([payload[8], payload[9]]) as usize;
    let args_end = HEADER_LEN
        .checked_add(len)
        .filter(|&end| end <= payload.len())
        .ok_or_else(|| {
            VmError::BadPayload(format!("init args length {len} overruns payload"))
        })?;

    let args = &payload[HEADER_LEN..args_end];
    let mut init_input = Vec::with_capacity(INIT_ACTION.len() + 1 + args.len());
    init_input.extend_from_slice(INIT_ACTION.as_bytes());
    init_input.push(b'|');
    init_input.extend_from_slice(args);

    Ok(DeployPayload {
        init_input,
        code: payload[args_end..].to_vec(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let args = br#"{"num":100,"name":"xxxx"}"#;
        let code = b"HelloWorld";

        let payload = encode(args, code).unwrap();
        assert_eq!(&payload[..4], &MODULE_MAGIC);
        assert_eq!(&payload[4..8], b"XLTC");

        let decoded = decode(&payload).unwrap();
        assert_eq!(
            decoded.init_input,
            br#"Init|{"num":100,"name":"xxxx"}"#.to_vec()
        );
        assert_eq!(decoded.code, code.to_vec());
    }

    #[test]
    fn test_decode_empty_args() {
        let payload = encode(b"", b"\x01\x02").unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.init_input, b"Init|".to_vec());
        assert_eq!(decoded.code, vec![1, 2]);
    }

    #[test]
    fn test_decode_bare_module() {
        let mut payload = MODULE_MAGIC.to_vec();
        payload.extend_from_slice(b"rest-of-module");

        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.init_input, b"Init|".to_vec());
        assert_eq!(decoded.code, payload);
    }

    #[test]
    fn test_decode_missing_magic() {
        let err = decode(b"not-a-module").unwrap_err();
        assert!(matches!(err, VmError::BadPayload(_)));
    }

    #[test]
    fn test_decode_truncated_args() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&MODULE_MAGIC);
        payload.extend_from_slice(&DEPLOY_TAG);
        payload.extend_from_slice(&100u16.to_be_bytes());
        payload.extend_from_slice(b"short");

        let err = decode(&payload).unwrap_err();
        assert!(matches!(err, VmError::BadPayload(_)));
    }

    #[test]
    fn test_encode_oversized_args() {
        let args = vec![0u8; 70_000];
        assert!(matches!(
            encode(&args, b""),
            Err(VmError::BadPayload(_))
        ));
    }
}
