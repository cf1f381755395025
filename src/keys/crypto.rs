//! Passphrase encryption for the admin private key
//!
//! The key is stored in the format produced by CryptoJS / `openssl enc
//! -aes-256-cbc -md md5`: base64 of `"Salted__" || salt[8] || ciphertext`,
//! with key and IV derived by `EVP_BytesToKey` over MD5.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use md5::{Digest, Md5};
use rand::RngCore;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encrypted key is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("encrypted key is missing the Salted__ header")]
    MissingSalt,
    #[error("wrong passphrase or corrupted ciphertext")]
    BadPadding,
    #[error("decrypted key is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid cipher key or iv length")]
    Length,
}

/// Encrypt `plaintext` with a freshly generated salt
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encrypt_with_salt(plaintext, passphrase, &salt)
}

fn encrypt_with_salt(
    plaintext: &str,
    passphrase: &str,
    salt: &[u8; SALT_LEN],
) -> Result<String, CryptoError> {
    let (key, iv) = evp_bytes_to_key(passphrase.as_bytes(), salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|_| CryptoError::Length)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut out = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + ciphertext.len());
    out.extend_from_slice(SALT_MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Decrypt a salted, base64 encoded ciphertext back into its UTF-8 text
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<String, CryptoError> {
    let raw = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    if raw.len() <= SALT_MAGIC.len() + SALT_LEN || !raw.starts_with(SALT_MAGIC) {
        return Err(CryptoError::MissingSalt);
    }

    let salt = &raw[SALT_MAGIC.len()..SALT_MAGIC.len() + SALT_LEN];
    let ciphertext = &raw[SALT_MAGIC.len() + SALT_LEN..];
    let (key, iv) = evp_bytes_to_key(passphrase.as_bytes(), salt);

    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|_| CryptoError::Length)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::BadPadding)?;
    Ok(String::from_utf8(plaintext)?)
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut derived = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut block: Vec<u8> = Vec::new();

    while derived.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&block);
        hasher.update(passphrase);
        hasher.update(salt);
        block = hasher.finalize().to_vec();
        derived.extend_from_slice(&block);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}
