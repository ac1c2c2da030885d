//! AES-256-GCM encryption for token records.
//!
//! Each encrypt call generates a fresh random nonce. The stored blob is
//! `hex(nonce) ":" hex(ciphertext)`. Authenticated encryption, so a wrong
//! key or tampered blob fails decryption instead of yielding garbage.
//! The master key is 64 hexadecimal characters (256 bits) from config.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Separator between the hex-encoded nonce and ciphertext
const SEPARATOR: char = ':';

/// Validates that the master key is exactly 64 hexadecimal characters.
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decoded key bytes (32 bytes)
/// * `Err` - If the key has the wrong length or is not valid hex
pub fn validate_key(key_hex: &str) -> Result<Vec<u8>> {
    if key_hex.len() != KEY_SIZE * 2 {
        return Err(anyhow!(
            "Encryption key must be {} hex characters ({} bits), got {}",
            KEY_SIZE * 2,
            KEY_SIZE * 8,
            key_hex.len()
        ));
    }

    let key_bytes = hex::decode(key_hex).context("Encryption key is not valid hex")?;

    Ok(key_bytes)
}

/// Encrypts plaintext using AES-256-GCM with a random nonce.
///
/// # Returns
/// * `Ok(String)` - `hex(nonce):hex(ciphertext)` blob for storage
/// * `Err` - If encryption fails
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Random nonce, never reused
    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(format!(
        "{}{}{}",
        hex::encode(nonce_bytes),
        SEPARATOR,
        hex::encode(ciphertext_bytes)
    ))
}

/// Decrypts a `hex(nonce):hex(ciphertext)` blob.
///
/// Rejects malformed input (missing separator, wrong nonce length, bad hex)
/// with a clear error. Authentication failure (wrong key or tampered data)
/// is an error as well, never silent corruption.
pub fn decrypt(blob: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let (nonce_hex, ciphertext_hex) = blob
        .split_once(SEPARATOR)
        .ok_or_else(|| anyhow!("Malformed encrypted blob: missing '{}' separator", SEPARATOR))?;

    let nonce_bytes = hex::decode(nonce_hex).context("Failed to decode nonce")?;
    let ciphertext_bytes = hex::decode(ciphertext_hex).context("Failed to decode ciphertext")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext_bytes = cipher
        .decrypt(nonce, ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}
