//! Decoding of CRO firmware configuration archives.
//!
//! A CRO container bundles a fixed header, optional seed/salt material, an encrypted payload, and
//! an integrity checksum. Vendors vary the key-derivation and cipher details across firmware
//! lines, so decoding is driven by a registry of immutable [`FormatDescriptor`]s selected by the
//! header's version field; supporting a new variant means registering one descriptor.
//!
//! The pipeline:
//!
//! ```text
//! raw bytes -> container reader -> (header, ciphertext)
//!           -> key derivation (using header salt/serial)
//!           -> decryption + checksum -> plaintext
//!           -> record parser -> ordered ConfigRecords
//! ```
//!
//! A checksum mismatch is advisory rather than fatal: the result still carries records, and
//! [`Provenance::verified`] tells the caller whether to trust them. All stages are pure in-memory
//! computation with no shared mutable state, so independent archives can be decoded concurrently
//! against a shared registry.

pub mod container;
pub mod decrypt;
pub mod error;
pub mod kdf;
pub mod records;
pub mod registry;

pub use crate::container::{parse_container, Container};
pub use crate::decrypt::IntegrityStatus;
pub use crate::error::CroError;
pub use crate::records::{ConfigRecord, FieldValue};
pub use crate::registry::{FormatDescriptor, FormatRegistry};

/// Metadata attached to a decode result: which descriptor decoded the archive and whether the
/// integrity checksum verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub version: u16,
    pub descriptor: &'static str,
    pub verified: bool,
}

/// The ordered record list plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub records: Vec<ConfigRecord>,
    pub provenance: Provenance,
}

/// Decode a CRO container using the built-in format registry.
pub fn decode(bytes: &[u8]) -> Result<DecodeResult, CroError> {
    decode_with(FormatRegistry::builtin(), bytes)
}

/// Decode a CRO container against an explicit registry.
///
/// Short-circuits on malformed containers, unsupported versions, key-derivation failures, hard
/// decryption failures, and truncated records; an integrity mismatch only clears
/// [`Provenance::verified`]. Derived keys and the decrypted plaintext are zeroized before this
/// function returns, on success and error paths alike.
pub fn decode_with(registry: &FormatRegistry, bytes: &[u8]) -> Result<DecodeResult, CroError> {
    let container = container::parse_container(bytes)?;
    let descriptor = registry.lookup(container.version)?;
    let key = kdf::derive_key(descriptor, &container)?;
    let (plaintext, integrity) = decrypt::decrypt(descriptor, &key, &container)?;
    drop(key);
    let records = records::parse_records(descriptor, &plaintext)?;

    Ok(DecodeResult {
        records,
        provenance: Provenance {
            version: descriptor.version,
            descriptor: descriptor.name,
            verified: integrity.is_verified(),
        },
    })
}
