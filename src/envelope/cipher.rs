//! Symmetric encryption of the watermark text.
//!
//! Two modes are supported:
//!
//! - **GCM** (preferred): AES-GCM with a fresh 12-byte nonce from the OS RNG,
//!   prepended to the ciphertext. The envelope timestamp is bound as
//!   associated data, so editing either the ciphertext or the timestamp makes
//!   decryption fail.
//! - **CFB** (legacy): AES-CFB with a fresh 16-byte IV prepended. There is no
//!   authentication; integrity rests entirely on the envelope checksum.
//!
//! The nonce/IV ‖ ciphertext blob is then base64-encoded for embedding.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use aes::{Aes128, Aes256};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::base64::{Base64Flavor, decode_lenient};
use crate::common::error::{Result, WatermarkError};

/// GCM nonce length in bytes.
pub const GCM_NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes.
pub const GCM_TAG_LEN: usize = 16;
/// AES block size, which is also the CFB IV length.
pub const AES_BLOCK_LEN: usize = 16;

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;
type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

/// Cipher construction used for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherMode {
    /// AES-GCM authenticated encryption
    Gcm,
    /// AES-CFB without authentication
    Cfb,
}

impl CipherMode {
    /// Bytes prepended to the ciphertext (nonce or IV).
    #[inline]
    pub fn prefix_len(self) -> usize {
        match self {
            CipherMode::Gcm => GCM_NONCE_LEN,
            CipherMode::Cfb => AES_BLOCK_LEN,
        }
    }

    /// Smallest decodable blob for this mode.
    #[inline]
    pub fn min_blob_len(self) -> usize {
        match self {
            CipherMode::Gcm => GCM_NONCE_LEN + GCM_TAG_LEN,
            CipherMode::Cfb => AES_BLOCK_LEN,
        }
    }
}

/// An AES key of one of the two supported sizes.
#[derive(Clone, PartialEq, Eq)]
pub enum SymmetricKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymmetricKey::Aes128(_) => f.write_str("SymmetricKey::Aes128(..)"),
            SymmetricKey::Aes256(_) => f.write_str("SymmetricKey::Aes256(..)"),
        }
    }
}

impl SymmetricKey {
    /// Derive an AES-256 key from a shared secret of any length.
    ///
    /// The secret is hashed with SHA-256 so every secret maps to a valid key
    /// length; no padding, repetition or truncation of the raw secret occurs.
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(digest.as_slice());
        SymmetricKey::Aes256(key)
    }

    /// Use the first 16 characters of a hex checksum as an AES-128 key.
    pub fn from_checksum_prefix(checksum: &str) -> Result<Self> {
        let prefix = checksum.as_bytes().get(..16).ok_or_else(|| {
            WatermarkError::Decryption(format!(
                "checksum too short for key derivation: {} chars",
                checksum.len()
            ))
        })?;
        let mut key = [0u8; 16];
        key.copy_from_slice(prefix);
        Ok(SymmetricKey::Aes128(key))
    }
}

/// Encrypt `plaintext` and return the base64 text of nonce/IV ‖ ciphertext.
pub fn encrypt(
    plaintext: &str,
    key: &SymmetricKey,
    mode: CipherMode,
    aad: &[u8],
    flavor: Base64Flavor,
) -> Result<String> {
    let mut prefix = vec![0u8; mode.prefix_len()];
    OsRng
        .try_fill_bytes(&mut prefix)
        .map_err(|e| WatermarkError::Encryption(format!("failed to generate nonce: {e}")))?;

    let body = match mode {
        CipherMode::Gcm => gcm_seal(key, &prefix, plaintext.as_bytes(), aad)?,
        CipherMode::Cfb => {
            let mut buf = plaintext.as_bytes().to_vec();
            match key {
                SymmetricKey::Aes128(k) => Aes128CfbEnc::new_from_slices(k, &prefix)
                    .map_err(|_| WatermarkError::Encryption("invalid AES-128 key/iv".into()))?
                    .encrypt(&mut buf),
                SymmetricKey::Aes256(k) => Aes256CfbEnc::new_from_slices(k, &prefix)
                    .map_err(|_| WatermarkError::Encryption("invalid AES-256 key/iv".into()))?
                    .encrypt(&mut buf),
            }
            buf
        },
    };

    let mut blob = prefix;
    blob.extend_from_slice(&body);
    Ok(flavor.encode(&blob))
}

/// Decode and decrypt a blob produced by [`encrypt`].
///
/// Accepts every base64 flavor in the legacy decode chain.
pub fn decrypt(encoded: &str, key: &SymmetricKey, mode: CipherMode, aad: &[u8]) -> Result<String> {
    let blob = decode_lenient(encoded)?;
    if blob.len() < mode.min_blob_len() {
        return Err(WatermarkError::Decryption(format!(
            "ciphertext too short: {} bytes, need at least {}",
            blob.len(),
            mode.min_blob_len()
        )));
    }

    let (prefix, body) = blob.split_at(mode.prefix_len());
    let plaintext = match mode {
        CipherMode::Gcm => gcm_open(key, prefix, body, aad)?,
        CipherMode::Cfb => {
            let mut buf = body.to_vec();
            match key {
                SymmetricKey::Aes128(k) => Aes128CfbDec::new_from_slices(k, prefix)
                    .map_err(|_| WatermarkError::Decryption("invalid AES-128 key/iv".into()))?
                    .decrypt(&mut buf),
                SymmetricKey::Aes256(k) => Aes256CfbDec::new_from_slices(k, prefix)
                    .map_err(|_| WatermarkError::Decryption("invalid AES-256 key/iv".into()))?
                    .decrypt(&mut buf),
            }
            buf
        },
    };

    Ok(String::from_utf8(plaintext)?)
}

fn gcm_seal(key: &SymmetricKey, nonce: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(nonce);
    let payload = Payload { msg, aad };
    let sealed = match key {
        SymmetricKey::Aes128(k) => Aes128Gcm::new_from_slice(k)
            .map_err(|_| WatermarkError::Encryption("invalid AES-128 key".into()))?
            .encrypt(nonce, payload),
        SymmetricKey::Aes256(k) => Aes256Gcm::new_from_slice(k)
            .map_err(|_| WatermarkError::Encryption("invalid AES-256 key".into()))?
            .encrypt(nonce, payload),
    };
    sealed.map_err(|_| WatermarkError::Encryption("AES-GCM encryption failed".into()))
}

fn gcm_open(key: &SymmetricKey, nonce: &[u8], body: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(nonce);
    let payload = Payload { msg: body, aad };
    let opened = match key {
        SymmetricKey::Aes128(k) => Aes128Gcm::new_from_slice(k)
            .map_err(|_| WatermarkError::Decryption("invalid AES-128 key".into()))?
            .decrypt(nonce, payload),
        SymmetricKey::Aes256(k) => Aes256Gcm::new_from_slice(k)
            .map_err(|_| WatermarkError::Decryption("invalid AES-256 key".into()))?
            .decrypt(nonce, payload),
    };
    opened.map_err(|_| WatermarkError::Decryption("AES-GCM authentication failed".into()))
}
