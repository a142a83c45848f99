use thiserror::Error;

/// Errors returned by the decode pipeline.
///
/// Every variant carries enough context (offsets, expected vs. actual values) to diagnose a bad
/// archive without re-running with extra instrumentation. An integrity-check mismatch is *not* an
/// error: it is reported through [`crate::Provenance::verified`] so partially garbled output can
/// still be inspected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CroError {
    /// The input is not a structurally valid CRO container.
    #[error("malformed container: {context}")]
    MalformedContainer { context: String },

    /// The container header names a format version with no registered descriptor.
    #[error("unsupported CRO format version {version}")]
    UnsupportedFormat { version: u16 },

    /// The descriptor's key-derivation strategy could not produce key material.
    #[error("key derivation failed: {context}")]
    KeyDerivation { context: &'static str },

    /// The cipher operation itself failed (e.g. invalid padding).
    #[error("decryption failed: {context}")]
    DecryptionFailed { context: &'static str },

    /// A field's declared length reads past the end of the decrypted payload.
    ///
    /// This is the one fatal parse error: it indicates corrupted or wrongly keyed plaintext,
    /// unlike an unknown-but-well-formed field (which is retained as a raw value).
    #[error(
        "truncated record at offset {offset}: field declares {declared} bytes, {available} remain"
    )]
    TruncatedRecord {
        offset: usize,
        declared: usize,
        available: usize,
    },
}
