//! AES-256-GCM encryption with PBKDF2-HMAC-SHA256 key derivation.
//!
//! One key is derived per store from the master passphrase and the store's
//! persisted salt. Every encryption draws a fresh 16-byte IV and keeps the
//! 16-byte tag detached so records can carry ciphertext, IV and tag as
//! separate fields. The record key is bound in as associated data, so a
//! ciphertext moved to a different key fails authentication.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Result, SecretError};

/// AES-256-GCM with a 128-bit IV.
type VaultCipher = AesGcm<Aes256, U16>;

pub const IV_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;
pub const SALT_SIZE: usize = 32;
pub const KEY_SIZE: usize = 32;

/// Domain tag mixed into [`DerivedKey::fingerprint`].
const KEY_CHECK_CONTEXT: &[u8] = b"vaultkeep-key-check-v1";

/// A 256-bit key derived from the master passphrase. Never persisted.
pub struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl DerivedKey {
    /// Derive a key via PBKDF2-HMAC-SHA256.
    pub fn derive(passphrase: &[u8], salt: &[u8], iterations: u32) -> Result<Self> {
        if salt.len() != SALT_SIZE {
            return Err(SecretError::KeyDerivation(format!(
                "salt must be {SALT_SIZE} bytes, got {}",
                salt.len()
            )));
        }
        if iterations == 0 {
            return Err(SecretError::KeyDerivation(
                "iteration count must be positive".to_string(),
            ));
        }

        Ok(Self {
            bytes: pbkdf2_sha256(passphrase, salt, iterations),
        })
    }

    /// Hex SHA-256 of the key under a fixed domain tag.
    ///
    /// Stored in the vault file so a handle can tell whether the records on
    /// disk are sealed under its key without decrypting any of them.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(KEY_CHECK_CONTEXT);
        hasher.update(&self.bytes[..]);
        hex::encode(hasher.finalize())
    }

    fn cipher(&self) -> Result<VaultCipher> {
        VaultCipher::new_from_slice(&self.bytes[..])
            .map_err(|e| SecretError::KeyDerivation(e.to_string()))
    }
}

fn pbkdf2_sha256(passphrase: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, &mut bytes[..]);
    bytes
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Output of a single encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypt `plaintext` for record `aad` under a fresh random IV.
pub fn encrypt(key: &DerivedKey, aad: &[u8], plaintext: &[u8]) -> Result<Sealed> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = key.cipher()?;
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), aad, &mut buffer)
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed {
        iv,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate. Any key, IV, tag, AAD or ciphertext mismatch
/// yields [`SecretError::DecryptionFailed`].
pub fn decrypt(key: &DerivedKey, aad: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(SecretError::DecryptionFailed(format!(
            "iv must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(SecretError::DecryptionFailed(format!(
            "auth tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = key.cipher()?;
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            aad,
            buffer.as_mut_slice(),
            GenericArray::from_slice(tag),
        )
        .map_err(|_| SecretError::DecryptionFailed("authentication failed".to_string()))?;

    Ok(buffer.to_vec())
}

/// Generate a new random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
