//! Key derivation for the registered format variants.
//!
//! Static-key variants return a descriptor-embedded constant; salted variants run an iterated
//! hash over a vendor constant and the container's salt/serial field:
//!
//! 1. `H = Hash(vendor_secret || salt)`
//! 2. For `i in 0..rounds`: `H = Hash(LE32(i) || H)`
//! 3. Key = first `key_len` bytes of `H`.
//!
//! Derived material lives in [`Zeroizing`] buffers so it is wiped on every exit path once the
//! decryption engine is done with it.

use zeroize::Zeroizing;

use crate::container::Container;
use crate::error::CroError;
use crate::registry::{FormatDescriptor, HashAlgorithm, KeyDerivation};

/// Block-mode ciphers derive their IV from the salt with this suffix; keeps the IV input domain
/// separated from the key-derivation input.
const IV_BLOCK: [u8; 4] = 0u32.to_le_bytes();

/// AES block size; IVs are truncated hashes of this length.
const IV_LEN: usize = 16;

/// Symmetric key material for a single decode operation. Scoped to that operation; both buffers
/// are zeroized on drop.
#[derive(Debug)]
pub struct DerivedKey {
    pub key: Zeroizing<Vec<u8>>,
    pub iv: Option<Zeroizing<Vec<u8>>>,
}

fn hash_into(hash: HashAlgorithm, data: &[u8], out: &mut [u8]) {
    match hash {
        HashAlgorithm::Sha1 => {
            use sha1::Digest as _;
            out.copy_from_slice(&sha1::Sha1::digest(data));
        }
        HashAlgorithm::Sha256 => {
            use sha2::Digest as _;
            out.copy_from_slice(&sha2::Sha256::digest(data));
        }
    }
}

fn iterated_hash(
    hash: HashAlgorithm,
    vendor_secret: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Zeroizing<Vec<u8>> {
    let digest_len = hash.output_len();
    let mut h = Zeroizing::new(vec![0u8; digest_len]);

    let mut seed = Zeroizing::new(Vec::with_capacity(vendor_secret.len() + salt.len()));
    seed.extend_from_slice(vendor_secret);
    seed.extend_from_slice(salt);
    hash_into(hash, &seed, &mut h);

    // Hash outputs overwrite `h` in place so no intermediate round material escapes zeroization;
    // the loop reuses one counter-prefixed buffer to avoid allocating per round.
    let mut round = Zeroizing::new(vec![0u8; 4 + digest_len]);
    for i in 0..rounds {
        round[..4].copy_from_slice(&i.to_le_bytes());
        round[4..].copy_from_slice(&h);
        hash_into(hash, &round, &mut h);
    }
    h
}

fn derive_iv(hash: HashAlgorithm, salt: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut input = Vec::with_capacity(salt.len() + IV_BLOCK.len());
    input.extend_from_slice(salt);
    input.extend_from_slice(&IV_BLOCK);
    let digest = Zeroizing::new(hash.digest(&input));
    Zeroizing::new(digest[..IV_LEN].to_vec())
}

/// Compute the key (and IV, for block modes) the descriptor's cipher needs.
///
/// Fails with [`CroError::KeyDerivation`] when the descriptor demands seed material the container
/// does not carry.
pub fn derive_key(
    descriptor: &FormatDescriptor,
    container: &Container<'_>,
) -> Result<DerivedKey, CroError> {
    let key = match descriptor.key_derivation {
        KeyDerivation::StaticKey { key } => Zeroizing::new(key.to_vec()),
        KeyDerivation::SaltedHash {
            hash,
            rounds,
            vendor_secret,
            key_len,
        } => {
            let salt = container.salt.as_ref().ok_or(CroError::KeyDerivation {
                context: "descriptor requires a salt the container does not carry",
            })?;
            let h = iterated_hash(hash, vendor_secret, salt, rounds);
            if key_len > h.len() {
                return Err(CroError::KeyDerivation {
                    context: "descriptor key length exceeds the derivation hash output",
                });
            }
            Zeroizing::new(h[..key_len].to_vec())
        }
    };

    let iv = if descriptor.cipher.needs_iv() {
        let salt = container.salt.as_ref().ok_or(CroError::KeyDerivation {
            context: "cipher requires an IV but the container carries no salt",
        })?;
        let hash = match descriptor.key_derivation {
            KeyDerivation::SaltedHash { hash, .. } => hash,
            KeyDerivation::StaticKey { .. } => HashAlgorithm::Sha256,
        };
        Some(derive_iv(hash, salt))
    } else {
        None
    };

    debug_assert_eq!(key.len(), descriptor.cipher.key_len());

    Ok(DerivedKey { key, iv })
}
