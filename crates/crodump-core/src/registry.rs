//! Registry of vendor format descriptors.
//!
//! Each CRO format version maps to one immutable [`FormatDescriptor`] specifying how key material
//! is derived, which cipher decrypts the payload, how the checksum is computed, and which field
//! identifiers carry credentials. Adding support for a new vendor variant means registering one
//! new descriptor; none of the pipeline stages branch on version numbers directly.

use std::sync::OnceLock;

use crate::error::CroError;

/// Static payload key for the legacy v1 format. Recovered from firmware; identical across all
/// devices shipping that firmware line.
pub const V1_STATIC_KEY: [u8; 16] = [
    0x8F, 0x21, 0xC3, 0x5D, 0x04, 0xB9, 0x6A, 0xE7, 0x12, 0xD8, 0x4B, 0x90, 0x3E, 0xA5, 0x77, 0x0C,
];

/// Vendor constant mixed into the salted derivation for v2 archives.
const V2_VENDOR_SECRET: &[u8] = b"CroSecV2\x00\x19\x84\x77";

/// Vendor constant mixed into the salted derivation for v3 archives.
const V3_VENDOR_SECRET: &[u8] = b"CroSecV3\x00\x20\x11\x5e";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => {
                use sha1::Digest as _;
                sha1::Sha1::digest(data).to_vec()
            }
            HashAlgorithm::Sha256 => {
                use sha2::Digest as _;
                sha2::Sha256::digest(data).to_vec()
            }
        }
    }
}

/// How a descriptor turns a container into symmetric key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    /// A constant key embedded in the descriptor; the container contributes nothing.
    StaticKey { key: &'static [u8] },
    /// Iterated hash over a vendor constant and the container-carried salt/serial:
    /// `H = Hash(vendor_secret || salt)`, then `H = Hash(LE32(i) || H)` for `i in 0..rounds`,
    /// truncated to `key_len` bytes.
    SaltedHash {
        hash: HashAlgorithm,
        rounds: u32,
        vendor_secret: &'static [u8],
        key_len: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Rc4,
    Aes128Cbc,
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Key length in bytes the cipher expects.
    pub fn key_len(self) -> usize {
        match self {
            CipherAlgorithm::Rc4 => 16,
            CipherAlgorithm::Aes128Cbc => 16,
            CipherAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Whether the cipher consumes an IV.
    pub fn needs_iv(self) -> bool {
        matches!(self, CipherAlgorithm::Aes128Cbc | CipherAlgorithm::Aes256Cbc)
    }
}

/// What the stored CRC32 covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumCoverage {
    /// Computed over the decrypted payload. Doubles as a wrong-key detector.
    Plaintext,
    /// Computed over the raw ciphertext as stored.
    Ciphertext,
}

/// One entry of a descriptor's field schema: maps a wire key identifier to its semantic name and
/// marks whether the field carries a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub key_id: u16,
    pub name: &'static str,
    pub sensitive: bool,
}

/// Immutable specification of one vendor/format variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub version: u16,
    pub name: &'static str,
    pub key_derivation: KeyDerivation,
    pub cipher: CipherAlgorithm,
    pub checksum: ChecksumCoverage,
    pub schema: &'static [FieldSchema],
}

impl FormatDescriptor {
    pub fn field(&self, key_id: u16) -> Option<&'static FieldSchema> {
        self.schema.iter().find(|f| f.key_id == key_id)
    }
}

/// Field schema for the legacy v1 firmware line.
static SCHEMA_V1: &[FieldSchema] = &[
    FieldSchema { key_id: 0x0001, name: "device.model", sensitive: false },
    FieldSchema { key_id: 0x0002, name: "device.serial", sensitive: false },
    FieldSchema { key_id: 0x0003, name: "device.hostname", sensitive: false },
    FieldSchema { key_id: 0x0010, name: "admin.username", sensitive: true },
    FieldSchema { key_id: 0x0011, name: "admin.password", sensitive: true },
    FieldSchema { key_id: 0x0020, name: "wifi.ssid", sensitive: false },
    FieldSchema { key_id: 0x0021, name: "wifi.psk", sensitive: true },
    FieldSchema { key_id: 0x0030, name: "lan.ip", sensitive: false },
    FieldSchema { key_id: 0x0031, name: "lan.dhcp", sensitive: false },
];

/// Field schema shared by the v2/v3 firmware lines; a superset of v1.
static SCHEMA_V2: &[FieldSchema] = &[
    FieldSchema { key_id: 0x0001, name: "device.model", sensitive: false },
    FieldSchema { key_id: 0x0002, name: "device.serial", sensitive: false },
    FieldSchema { key_id: 0x0003, name: "device.hostname", sensitive: false },
    FieldSchema { key_id: 0x0010, name: "admin.username", sensitive: true },
    FieldSchema { key_id: 0x0011, name: "admin.password", sensitive: true },
    FieldSchema { key_id: 0x0020, name: "wifi.ssid", sensitive: false },
    FieldSchema { key_id: 0x0021, name: "wifi.psk", sensitive: true },
    FieldSchema { key_id: 0x0030, name: "lan.ip", sensitive: false },
    FieldSchema { key_id: 0x0031, name: "lan.dhcp", sensitive: false },
    FieldSchema { key_id: 0x0040, name: "wan.ppp.username", sensitive: true },
    FieldSchema { key_id: 0x0041, name: "wan.ppp.password", sensitive: true },
    FieldSchema { key_id: 0x0050, name: "snmp.community", sensitive: true },
    FieldSchema { key_id: 0x0060, name: "ntp.server", sensitive: false },
];

static BUILTIN_DESCRIPTORS: [FormatDescriptor; 3] = [
    FormatDescriptor {
        version: 1,
        name: "cro-v1",
        key_derivation: KeyDerivation::StaticKey {
            key: &V1_STATIC_KEY,
        },
        cipher: CipherAlgorithm::Rc4,
        checksum: ChecksumCoverage::Plaintext,
        schema: SCHEMA_V1,
    },
    FormatDescriptor {
        version: 2,
        name: "cro-v2",
        key_derivation: KeyDerivation::SaltedHash {
            hash: HashAlgorithm::Sha1,
            rounds: 4096,
            vendor_secret: V2_VENDOR_SECRET,
            key_len: 16,
        },
        cipher: CipherAlgorithm::Aes128Cbc,
        checksum: ChecksumCoverage::Plaintext,
        schema: SCHEMA_V2,
    },
    FormatDescriptor {
        version: 3,
        name: "cro-v3",
        key_derivation: KeyDerivation::SaltedHash {
            hash: HashAlgorithm::Sha256,
            rounds: 8192,
            vendor_secret: V3_VENDOR_SECRET,
            key_len: 32,
        },
        cipher: CipherAlgorithm::Aes256Cbc,
        checksum: ChecksumCoverage::Plaintext,
        schema: SCHEMA_V2,
    },
];

/// Read-only lookup table from format version to descriptor. Safe to share by reference across
/// concurrent decode calls.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    descriptors: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    /// A registry holding the given descriptors. Intended for tests and for embedding callers
    /// that carry descriptors sourced from their own reverse-engineering notes.
    pub fn new(descriptors: Vec<FormatDescriptor>) -> Self {
        Self { descriptors }
    }

    /// The process-wide registry of built-in vendor variants.
    pub fn builtin() -> &'static FormatRegistry {
        static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| FormatRegistry::new(BUILTIN_DESCRIPTORS.to_vec()))
    }

    /// Deterministic, pure lookup by container version.
    pub fn lookup(&self, version: u16) -> Result<&FormatDescriptor, CroError> {
        self.descriptors
            .iter()
            .find(|d| d.version == version)
            .ok_or(CroError::UnsupportedFormat { version })
    }
}
