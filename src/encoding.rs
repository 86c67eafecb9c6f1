//! Binary tree artifacts.
//!
//! Layout: 16-byte little-endian header + bincode payload.
//!
//! | offset | field          |
//! |--------|----------------|
//! | 0      | magic "WCTR"   |
//! | 4      | format version |
//! | 8      | payload length |
//! | 12     | node count     |
//!
//! The node count is redundant with the payload and exists to catch
//! truncation and stale-format corruption cheaply before the full invariant
//! sweep. Decoding checks size, magic, version, payload length, then the
//! payload itself, then every tree invariant; any failure maps to cache-miss
//! semantics upstream (discard and rebuild), never to a served tree.
//!
//! Artifacts live hex-encoded inside the word document, so the byte layout
//! is the compatibility contract: bump [`TREE_ARTIFACT_VERSION`] on any
//! change.

use crate::constants::{TREE_ARTIFACT_HEADER_LEN, TREE_ARTIFACT_MAGIC, TREE_ARTIFACT_VERSION};
use crate::errors::{DecodeError, EncodeError};
use crate::tree::WordProbabilityTree;

/// Serialize a tree to the framed artifact bytes.
pub fn encode_tree(tree: &WordProbabilityTree) -> Result<Vec<u8>, EncodeError> {
    let payload = bincode::serialize(tree).map_err(|e| EncodeError(e.to_string()))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| EncodeError(format!("payload of {} bytes overflows header", payload.len())))?;
    let node_count = u32::try_from(tree.node_count())
        .map_err(|_| EncodeError(format!("node count {} overflows header", tree.node_count())))?;

    let mut bytes = Vec::with_capacity(TREE_ARTIFACT_HEADER_LEN + payload.len());
    bytes.extend_from_slice(&TREE_ARTIFACT_MAGIC.to_le_bytes());
    bytes.extend_from_slice(&TREE_ARTIFACT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&node_count.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize and fully validate an artifact.
pub fn decode_tree(bytes: &[u8]) -> Result<WordProbabilityTree, DecodeError> {
    if bytes.len() < TREE_ARTIFACT_HEADER_LEN {
        return Err(DecodeError::Truncated { got: bytes.len() });
    }
    let magic = read_u32_le(bytes, 0);
    if magic != TREE_ARTIFACT_MAGIC {
        return Err(DecodeError::BadMagic { got: magic });
    }
    let version = read_u32_le(bytes, 4);
    if version != TREE_ARTIFACT_VERSION {
        return Err(DecodeError::BadVersion { got: version });
    }
    let expected = read_u32_le(bytes, 8) as usize;
    let got = bytes.len() - TREE_ARTIFACT_HEADER_LEN;
    if expected != got {
        return Err(DecodeError::LengthMismatch { expected, got });
    }

    let tree: WordProbabilityTree = bincode::deserialize(&bytes[TREE_ARTIFACT_HEADER_LEN..])
        .map_err(|e| DecodeError::Payload(e.to_string()))?;

    let node_count = read_u32_le(bytes, 12) as usize;
    if node_count != tree.node_count() {
        return Err(DecodeError::Invariant(format!(
            "node count {} in header, {} in payload",
            node_count,
            tree.node_count()
        )));
    }
    tree.validate().map_err(DecodeError::Invariant)?;
    Ok(tree)
}

/// Encode straight to the hex form stored in word documents.
pub fn encode_tree_hex(tree: &WordProbabilityTree) -> Result<String, EncodeError> {
    Ok(to_hex(&encode_tree(tree)?))
}

/// Decode from the hex form stored in word documents.
pub fn decode_tree_hex(text: &str) -> Result<WordProbabilityTree, DecodeError> {
    decode_tree(&from_hex(text)?)
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Lowercase hex, two digits per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        text.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        text.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    text
}

/// Strict inverse of [`to_hex`]: even length, hex digits only.
pub fn from_hex(text: &str) -> Result<Vec<u8>, DecodeError> {
    if !text.is_ascii() {
        return Err(DecodeError::Hex("non-ascii input".to_string()));
    }
    if text.len() % 2 != 0 {
        return Err(DecodeError::Hex(format!("odd length {}", text.len())));
    }
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for i in (0..text.len()).step_by(2) {
        let pair = &text[i..i + 2];
        let byte = u8::from_str_radix(pair, 16)
            .map_err(|_| DecodeError::Hex(format!("bad digits {pair:?} at offset {i}")))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(field)
}
