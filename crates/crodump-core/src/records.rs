//! Typed configuration records recovered from decrypted payloads.
//!
//! The plaintext is a flat sequence of length-prefixed fields:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       2     key identifier (u16 LE)
//! 2       1     type tag
//! 3       4     value length (u32 LE)
//! 7       n     value
//! ```
//!
//! Unknown type tags do not abort parsing; the field is retained with its raw bytes so archives
//! written by newer firmware still decode. The same demotion applies to a known tag whose value
//! payload is malformed (wrong width, invalid UTF-8): the bytes are preserved verbatim, which also
//! keeps [`encode_records`] a byte-exact inverse of [`parse_records`].

use crate::error::CroError;
use crate::registry::FormatDescriptor;

pub const TAG_TEXT: u8 = 0x01;
pub const TAG_U32: u8 = 0x02;
pub const TAG_BYTES: u8 = 0x03;
pub const TAG_BOOL: u8 = 0x04;

const FIELD_HEADER_LEN: usize = 7;

/// A decoded field value. `Raw` carries both unrecognized tags and malformed payloads of known
/// tags, preserving the original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    U32(u32),
    Bytes(Vec<u8>),
    Bool(bool),
    Raw { tag: u8, bytes: Vec<u8> },
}

impl FieldValue {
    /// Wire type tag this value encodes under.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Text(_) => TAG_TEXT,
            FieldValue::U32(_) => TAG_U32,
            FieldValue::Bytes(_) => TAG_BYTES,
            FieldValue::Bool(_) => TAG_BOOL,
            FieldValue::Raw { tag, .. } => *tag,
        }
    }
}

/// One configuration entry, in plaintext order. `sensitive` marks credentials per the
/// descriptor's allowlist; redaction itself is the output layer's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub key_id: u16,
    pub name: String,
    pub value: FieldValue,
    pub sensitive: bool,
}

fn decode_value(tag: u8, bytes: &[u8]) -> FieldValue {
    match tag {
        TAG_TEXT => match std::str::from_utf8(bytes) {
            Ok(s) => FieldValue::Text(s.to_string()),
            Err(_) => FieldValue::Raw {
                tag,
                bytes: bytes.to_vec(),
            },
        },
        TAG_U32 if bytes.len() == 4 => {
            FieldValue::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        TAG_BYTES => FieldValue::Bytes(bytes.to_vec()),
        TAG_BOOL if bytes == [0] => FieldValue::Bool(false),
        TAG_BOOL if bytes == [1] => FieldValue::Bool(true),
        _ => FieldValue::Raw {
            tag,
            bytes: bytes.to_vec(),
        },
    }
}

/// Walk `plaintext` and reconstruct the ordered record list.
///
/// The only fatal condition is a field whose declared length (or fixed header) reads past the end
/// of the buffer; anything else is preserved as a raw field.
pub fn parse_records(
    descriptor: &FormatDescriptor,
    plaintext: &[u8],
) -> Result<Vec<ConfigRecord>, CroError> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < plaintext.len() {
        let available = plaintext.len() - offset;
        if available < FIELD_HEADER_LEN {
            return Err(CroError::TruncatedRecord {
                offset,
                declared: FIELD_HEADER_LEN,
                available,
            });
        }

        let key_id = u16::from_le_bytes([plaintext[offset], plaintext[offset + 1]]);
        let tag = plaintext[offset + 2];
        let len = u32::from_le_bytes([
            plaintext[offset + 3],
            plaintext[offset + 4],
            plaintext[offset + 5],
            plaintext[offset + 6],
        ]) as usize;

        let value_start = offset + FIELD_HEADER_LEN;
        let available = plaintext.len() - value_start;
        if len > available {
            return Err(CroError::TruncatedRecord {
                offset,
                declared: len,
                available,
            });
        }
        let value_bytes = &plaintext[value_start..value_start + len];

        let (name, sensitive) = match descriptor.field(key_id) {
            Some(f) => (f.name.to_string(), f.sensitive),
            None => (format!("field.0x{key_id:04x}"), false),
        };

        records.push(ConfigRecord {
            key_id,
            name,
            value: decode_value(tag, value_bytes),
            sensitive,
        });

        offset = value_start + len;
    }

    Ok(records)
}

/// Serialize records back to the plaintext wire form. Inverse of [`parse_records`]; used by
/// fixture builders and round-trip tests.
pub fn encode_records(records: &[ConfigRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        let bytes: Vec<u8> = match &record.value {
            FieldValue::Text(s) => s.as_bytes().to_vec(),
            FieldValue::U32(v) => v.to_le_bytes().to_vec(),
            FieldValue::Bytes(b) => b.clone(),
            FieldValue::Bool(b) => vec![u8::from(*b)],
            FieldValue::Raw { bytes, .. } => bytes.clone(),
        };
        out.extend_from_slice(&record.key_id.to_le_bytes());
        out.push(record.value.tag());
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}
