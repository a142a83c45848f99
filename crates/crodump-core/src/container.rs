//! CRO container framing.
//!
//! A container is a fixed little-endian header followed by the encrypted payload:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     magic ("CroFile\0")
//! 8       2     format version (u16 LE)
//! 10      2     flags (u16 LE); bit 0 = salt present
//! 12      4     payload length (u32 LE)
//! 16      4     checksum (u32 LE, CRC32; coverage is per-descriptor)
//! 20      16    salt (only when flags bit 0 is set)
//! ...           payload (ciphertext)
//! ```
//!
//! The declared payload length must equal the actual remaining byte count; a mismatch in either
//! direction is treated as structural corruption rather than silently truncating.

use crate::error::CroError;

/// Magic bytes at the start of every CRO container.
pub const CRO_MAGIC: [u8; 8] = *b"CroFile\0";

/// Header size without the optional salt.
pub const MIN_HEADER_LEN: usize = 20;

/// Length of the embedded salt/serial seed material, when present.
pub const SALT_LEN: usize = 16;

/// Header flag: the 16-byte salt field follows the fixed header.
pub const FLAG_HAS_SALT: u16 = 0x0001;

/// A validated CRO container. Read-only once constructed; the ciphertext is borrowed from the
/// input buffer rather than copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container<'a> {
    pub version: u16,
    pub flags: u16,
    pub checksum: u32,
    pub salt: Option<[u8; SALT_LEN]>,
    pub ciphertext: &'a [u8],
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], CroError> {
        let end = self.pos.saturating_add(n);
        if end > self.bytes.len() {
            return Err(CroError::MalformedContainer {
                context: format!(
                    "truncated while reading {context} at offset {}: need {n} bytes, {} remain",
                    self.pos,
                    self.bytes.len() - self.pos
                ),
            });
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u16_le(&mut self, context: &'static str) -> Result<u16, CroError> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32_le(&mut self, context: &'static str) -> Result<u32, CroError> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Validate structural well-formedness of `bytes` and produce a [`Container`].
pub fn parse_container(bytes: &[u8]) -> Result<Container<'_>, CroError> {
    let mut r = Reader::new(bytes);

    let magic = r.take(CRO_MAGIC.len(), "magic")?;
    if magic != CRO_MAGIC {
        return Err(CroError::MalformedContainer {
            context: format!("unknown magic {magic:02x?}, expected {CRO_MAGIC:02x?}"),
        });
    }

    let version = r.read_u16_le("format version")?;
    let flags = r.read_u16_le("flags")?;
    let payload_len = r.read_u32_le("payload length")? as usize;
    let checksum = r.read_u32_le("checksum")?;

    let salt = if flags & FLAG_HAS_SALT != 0 {
        let raw = r.take(SALT_LEN, "salt")?;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(raw);
        Some(salt)
    } else {
        None
    };

    let ciphertext = r.remaining();
    if ciphertext.len() != payload_len {
        return Err(CroError::MalformedContainer {
            context: format!(
                "declared payload length {payload_len} bytes, found {}",
                ciphertext.len()
            ),
        });
    }

    Ok(Container {
        version,
        flags,
        checksum,
        salt,
        ciphertext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_container(version: u16, flags: u16, salt: Option<[u8; 16]>, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CRO_MAGIC);
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        if let Some(salt) = salt {
            out.extend_from_slice(&salt);
        }
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn parses_header_without_salt() {
        let bytes = minimal_container(1, 0, None, b"payload");
        let c = parse_container(&bytes).expect("parse");
        assert_eq!(c.version, 1);
        assert_eq!(c.flags, 0);
        assert_eq!(c.checksum, 0xDEADBEEF);
        assert_eq!(c.salt, None);
        assert_eq!(c.ciphertext, b"payload");
    }

    #[test]
    fn parses_header_with_salt() {
        let salt = [0x5Au8; 16];
        let bytes = minimal_container(2, FLAG_HAS_SALT, Some(salt), &[1, 2, 3]);
        let c = parse_container(&bytes).expect("parse");
        assert_eq!(c.salt, Some(salt));
        assert_eq!(c.ciphertext, &[1, 2, 3]);
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut bytes = minimal_container(1, 0, None, b"payload");
        bytes[0] = b'X';
        let err = parse_container(&bytes).expect_err("bad magic");
        assert!(matches!(err, CroError::MalformedContainer { .. }));
    }

    #[test]
    fn rejects_short_input() {
        let err = parse_container(b"CroFile\0\x01\x00").expect_err("short");
        assert!(matches!(err, CroError::MalformedContainer { .. }));
    }

    #[test]
    fn rejects_truncated_salt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CRO_MAGIC);
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&FLAG_HAS_SALT.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 7]); // salt cut short
        let err = parse_container(&bytes).expect_err("truncated salt");
        assert!(matches!(err, CroError::MalformedContainer { .. }));
    }

    #[test]
    fn rejects_payload_length_mismatch_in_both_directions() {
        // Declared longer than actual.
        let mut bytes = minimal_container(1, 0, None, b"abcd");
        bytes[12..16].copy_from_slice(&10u32.to_le_bytes());
        assert!(matches!(
            parse_container(&bytes),
            Err(CroError::MalformedContainer { .. })
        ));

        // Declared shorter than actual.
        let mut bytes = minimal_container(1, 0, None, b"abcd");
        bytes[12..16].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            parse_container(&bytes),
            Err(CroError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn empty_payload_is_well_formed() {
        let bytes = minimal_container(1, 0, None, b"");
        let c = parse_container(&bytes).expect("parse");
        assert!(c.ciphertext.is_empty());
    }
}
