//! Fixture builders: forward-encrypt payloads with the same primitives the decoder reverses.
#![allow(dead_code)] // not every test binary uses every helper

use aes::{Aes128, Aes256};
use cbc::Encryptor;
use cipher::{block_padding::Pkcs7, BlockCipher, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher as _};
use rc4::{consts::U16, Rc4};

use crodump_core::container::{CRO_MAGIC, FLAG_HAS_SALT};
use crodump_core::kdf::derive_key;
use crodump_core::registry::{CipherAlgorithm, FormatRegistry};
use crodump_core::Container;

/// Assemble raw container bytes around an already-encrypted payload.
pub fn build_container(
    version: u16,
    checksum: u32,
    salt: Option<[u8; 16]>,
    ciphertext: &[u8],
) -> Vec<u8> {
    let flags: u16 = if salt.is_some() { FLAG_HAS_SALT } else { 0 };
    let mut out = Vec::new();
    out.extend_from_slice(&CRO_MAGIC);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum.to_le_bytes());
    if let Some(salt) = salt {
        out.extend_from_slice(&salt);
    }
    out.extend_from_slice(ciphertext);
    out
}

fn aes_cbc_encrypt<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Vec<u8>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    Encryptor::<C>::new_from_slices(key, iv)
        .expect("valid key/iv length")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Encrypt `plaintext` the way the registered descriptor for `version` expects, and wrap it in a
/// container whose checksum matches.
pub fn encrypt_container(version: u16, salt: Option<[u8; 16]>, plaintext: &[u8]) -> Vec<u8> {
    let descriptor = FormatRegistry::builtin()
        .lookup(version)
        .expect("registered version");

    // A header-only container template is enough for key derivation.
    let template = Container {
        version,
        flags: if salt.is_some() { FLAG_HAS_SALT } else { 0 },
        checksum: 0,
        salt,
        ciphertext: &[],
    };
    let key = derive_key(descriptor, &template).expect("derive key");

    let ciphertext = if plaintext.is_empty() {
        Vec::new()
    } else {
        match descriptor.cipher {
            CipherAlgorithm::Rc4 => {
                let mut buf = plaintext.to_vec();
                Rc4::<U16>::new_from_slice(&key.key)
                    .expect("16-byte RC4 key")
                    .apply_keystream(&mut buf);
                buf
            }
            CipherAlgorithm::Aes128Cbc => aes_cbc_encrypt::<Aes128>(
                &key.key,
                key.iv.as_ref().expect("iv"),
                plaintext,
            ),
            CipherAlgorithm::Aes256Cbc => aes_cbc_encrypt::<Aes256>(
                &key.key,
                key.iv.as_ref().expect("iv"),
                plaintext,
            ),
        }
    };

    build_container(version, crc32fast::hash(plaintext), salt, &ciphertext)
}

/// Encode one plaintext field in the record wire form.
pub fn field(key_id: u16, tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&key_id.to_le_bytes());
    out.push(tag);
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value);
    out
}
