//! Key derivation and symmetric primitives.
//!
//! This module provides the cryptographic building blocks for the record
//! envelope:
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256 over the machine-bound password,
//!   producing both the AES-256 key and the CBC IV from one 64-byte block.
//! - **Encryption/decryption**: AES-256-CBC with PKCS#7 padding.
//! - **Integrity digests**: base64-encoded SHA-512.
//! - **Random generation**: cryptographically secure salt bytes via `ring`.
//!
//! # Security Notes
//!
//! - The PBKDF2 salt is empty and the IV comes from the derived block.  Both
//!   are required by the on-disk format: the same `(user, machine, data_key)`
//!   triple must always yield the same key and IV, or ciphertext written by
//!   one store call could never be compared across replicas.  The cost is
//!   that CBC loses semantic security for repeated plaintexts under one
//!   data key; the per-record salt inside the envelope restores ciphertext
//!   uniqueness.
//! - 1000 iterations is far below current PBKDF2 guidance.  It is kept for
//!   compatibility with existing stores; a format revision should raise it
//!   and introduce a per-install salt.
//! - The SHA-512 integrity digest is unkeyed.  It detects corruption and
//!   wrong-key decryption, not forgery by an attacker who can write
//!   plaintext envelopes.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::digest;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, StoreError};

/// Length of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the CBC initialisation vector in bytes.
pub const IV_LEN: usize = 16;

/// Length of the per-record salt in bytes.
pub const SALT_LEN: usize = 32;

/// PBKDF2 iteration count.  Fixed by the on-disk format.
const PBKDF2_ITERATIONS: u32 = 1000;

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive the AES-256 key and CBC IV for one record password.
///
/// The password is the byte concatenation `user_name ‖ machine_id ‖ data_key`.
/// Derivation is fully deterministic: 64 bytes of PBKDF2 output, of which
/// bytes `0..32` become the key and bytes `32..48` the IV.
pub fn derive_key_iv(password: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");

    let mut derived = [0u8; KEY_LEN + KEY_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations, &[], password, &mut derived);

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..KEY_LEN + IV_LEN]);

    tracing::trace!("derived record key and iv");
    (key, iv)
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` with AES-256-CBC and PKCS#7 padding.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-256-CBC ciphertext.
///
/// Returns `None` when the ciphertext length is not a whole number of blocks
/// or the padding is invalid — with CBC that is the expected outcome of
/// decrypting with the wrong key, so the caller treats it as a soft failure.
pub fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Option<Vec<u8>> {
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .ok()
}

// ---------------------------------------------------------------------------
// Digests and randomness
// ---------------------------------------------------------------------------

/// Base64-encoded SHA-512 digest: always 88 ASCII characters including the
/// trailing `=` padding.
pub fn sha512_base64(data: &[u8]) -> String {
    BASE64.encode(digest::digest(&digest::SHA512, data).as_ref())
}

/// Generate a fresh 32-byte record salt.
///
/// # Errors
///
/// Returns [`StoreError::EncryptionFailed`] if the system CSPRNG fails.
pub fn random_salt() -> Result<[u8; SALT_LEN]> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| StoreError::EncryptionFailed {
            reason: "failed to generate random salt".into(),
        })?;
    Ok(salt)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
