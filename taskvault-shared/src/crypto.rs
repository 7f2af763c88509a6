//! Secret field cipher
//!
//! Task security codes are stored as `base64(iv || ciphertext)` using
//! AES-256 in full-block CFB mode with a fresh random IV per call. Encryption
//! is therefore non-deterministic, while decryption of a given payload with
//! the same key always yields the same plaintext.
//!
//! # Key Handling
//!
//! The configured key string is forced to 32 bytes by [`fix_key`]: shorter
//! keys are right-padded with ASCII `'0'`, longer ones are truncated. This
//! weakens short keys instead of deriving a proper key, and is kept only so
//! existing ciphertexts stay readable.
//!
//! # Example
//!
//! ```
//! use taskvault_shared::crypto::{decrypt, encrypt};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sealed = encrypt("42", "MySecretEncryptionKey!")?;
//! assert_eq!(decrypt(&sealed, "MySecretEncryptionKey!")?, "42");
//! # Ok(())
//! # }
//! ```

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::RngCore;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

/// AES block size, also the IV length
pub const BLOCK_SIZE: usize = 16;

/// Key size for AES-256
pub const KEY_SIZE: usize = 32;

/// Error type for cipher operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Decoded payload cannot hold an IV
    #[error("ciphertext too short")]
    InvalidCiphertext,

    /// Payload is not standard base64
    #[error("invalid ciphertext encoding: {0}")]
    InvalidEncoding(String),

    /// Decrypted bytes are not UTF-8 (usually a wrong key)
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,

    /// Cipher could not be initialised
    #[error("cipher initialisation failed: {0}")]
    Init(String),
}

/// Forces a key string to exactly [`KEY_SIZE`] bytes
///
/// # Example
///
/// ```
/// use taskvault_shared::crypto::fix_key;
///
/// assert_eq!(&fix_key("abc")[..5], b"abc00");
/// assert_eq!(fix_key(&"k".repeat(40)), [b'k'; 32]);
/// ```
pub fn fix_key(key: &str) -> [u8; KEY_SIZE] {
    let mut fixed = [b'0'; KEY_SIZE];
    let bytes = key.as_bytes();
    let len = bytes.len().min(KEY_SIZE);
    fixed[..len].copy_from_slice(&bytes[..len]);
    fixed
}

/// Encrypts `plaintext`, returning `base64(iv || ciphertext)`
pub fn encrypt(plaintext: &str, key: &str) -> Result<String, CipherError> {
    let key = fix_key(key);

    let mut payload = vec![0u8; BLOCK_SIZE + plaintext.len()];
    let (iv, body) = payload.split_at_mut(BLOCK_SIZE);
    rand::thread_rng().fill_bytes(iv);
    body.copy_from_slice(plaintext.as_bytes());

    Aes256CfbEnc::new_from_slices(&key, iv)
        .map_err(|e| CipherError::Init(e.to_string()))?
        .encrypt(body);

    Ok(BASE64.encode(&payload))
}

/// Decrypts a value produced by [`encrypt`]
///
/// # Errors
///
/// - `InvalidEncoding` if the value is not base64
/// - `InvalidCiphertext` if the decoded payload is shorter than one block
/// - `InvalidUtf8` if the plaintext is not UTF-8
pub fn decrypt(sealed: &str, key: &str) -> Result<String, CipherError> {
    let key = fix_key(key);

    let mut payload = BASE64
        .decode(sealed)
        .map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;
    if payload.len() < BLOCK_SIZE {
        return Err(CipherError::InvalidCiphertext);
    }

    let (iv, body) = payload.split_at_mut(BLOCK_SIZE);
    Aes256CfbDec::new_from_slices(&key, iv)
        .map_err(|e| CipherError::Init(e.to_string()))?
        .decrypt(body);

    String::from_utf8(body.to_vec()).map_err(|_| CipherError::InvalidUtf8)
}
