//! Per-record cryptographic envelope.
//!
//! Every stored value is wrapped in one plaintext envelope before
//! encryption:
//!
//! ```text
//! [ 3 bytes: type tag ]
//! [ n bytes: value text ]
//! [88 bytes: base64(SHA-512(tag ‖ value text)) ]
//! [32 bytes: random salt ]
//! [ 1 byte : NUL terminator ]
//! ```
//!
//! The whole structure is encrypted as one AES-256-CBC message.  The
//! integrity field lets a reader tell "decryption produced noise" (wrong
//! machine or key) apart from "decryption produced a valid envelope", which
//! is what makes replica voting possible.  The salt makes identical values
//! produce distinct ciphertexts per store call, so bitwise equality between
//! replica files proves shared provenance rather than shared value.
//!
//! The trailing NUL is a fossil of the original on-disk format, which
//! encrypted one byte past the end of the plaintext string.  Readers trim
//! `salt + 1` bytes; existing stores depend on that width, so the writer
//! reproduces it.

use crate::crypto::{self, IV_LEN, KEY_LEN, SALT_LEN};
use crate::error::Result;
use crate::value::TypeTag;

/// Width of the base64 SHA-512 integrity field.
pub const INTEGRITY_LEN: usize = 88;

/// Bytes trimmed from the tail after decryption: salt plus NUL terminator.
const TRAILER_LEN: usize = SALT_LEN + 1;

/// Smallest possible `tag ‖ value_text ‖ integrity` section (empty value).
const MIN_BODY_LEN: usize = TypeTag::LEN + INTEGRITY_LEN;

/// Why a decode attempt produced no value.
///
/// Both outcomes are soft: the replica layer absorbs them per replica and
/// only surfaces an error when no replica survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Decryption, framing, or the integrity check failed; the bytes are not
    /// a valid envelope under this key.
    Invalid,
    /// A structurally valid envelope whose type tag differs from the one the
    /// caller asked for.
    TagMismatch,
}

/// Stateless encoder/decoder bound to one machine identity.
///
/// The identity never changes over the life of a store, so the codec is
/// built once at construction and shared by every operation.
pub struct EnvelopeCodec {
    user_name: String,
    machine_id: String,
}

impl EnvelopeCodec {
    /// Create a codec for the given identity.
    pub fn new(user_name: impl Into<String>, machine_id: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            machine_id: machine_id.into(),
        }
    }

    /// Derive the record key and IV for one data key.
    ///
    /// The KDF password is `user_name ‖ machine_id ‖ data_key`, which is what
    /// binds ciphertext to this host: a different user or machine derives a
    /// different key and decryption degrades to noise.
    fn derive(&self, data_key: &str) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
        let mut password = Vec::with_capacity(
            self.user_name.len() + self.machine_id.len() + data_key.len(),
        );
        password.extend_from_slice(self.user_name.as_bytes());
        password.extend_from_slice(self.machine_id.as_bytes());
        password.extend_from_slice(data_key.as_bytes());
        crypto::derive_key_iv(&password)
    }

    /// Encrypt one value into its on-disk ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EncryptionFailed`](crate::StoreError::EncryptionFailed)
    /// only if salt generation fails.
    pub fn seal(&self, data_key: &str, tag: TypeTag, value_text: &[u8]) -> Result<Vec<u8>> {
        let (key, iv) = self.derive(data_key);

        let mut plaintext = Vec::with_capacity(
            TypeTag::LEN + value_text.len() + INTEGRITY_LEN + TRAILER_LEN,
        );
        plaintext.extend_from_slice(tag.as_str().as_bytes());
        plaintext.extend_from_slice(value_text);

        // Integrity covers tag + value text only; the salt stays outside so
        // it can differ between writes of the same value.
        let integrity = crypto::sha512_base64(&plaintext);
        plaintext.extend_from_slice(integrity.as_bytes());

        let salt = crypto::random_salt()?;
        plaintext.extend_from_slice(&salt);
        plaintext.push(0);

        Ok(crypto::encrypt(&plaintext, &key, &iv))
    }

    /// Decrypt and verify one replica's ciphertext, returning the value text.
    pub fn open(
        &self,
        data_key: &str,
        ciphertext: &[u8],
        expected: TypeTag,
    ) -> std::result::Result<Vec<u8>, DecodeFailure> {
        let (key, iv) = self.derive(data_key);

        let mut plaintext =
            crypto::decrypt(ciphertext, &key, &iv).ok_or(DecodeFailure::Invalid)?;

        if plaintext.len() < TRAILER_LEN + MIN_BODY_LEN {
            return Err(DecodeFailure::Invalid);
        }
        plaintext.truncate(plaintext.len() - TRAILER_LEN);

        let split = plaintext.len() - INTEGRITY_LEN;
        let (body, integrity) = plaintext.split_at(split);

        if crypto::sha512_base64(body).as_bytes() != integrity {
            return Err(DecodeFailure::Invalid);
        }
        if &body[..TypeTag::LEN] != expected.as_str().as_bytes() {
            return Err(DecodeFailure::TagMismatch);
        }

        Ok(body[TypeTag::LEN..].to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
