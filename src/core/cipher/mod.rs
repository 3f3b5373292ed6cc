//! Cryptographic operations.
//!
//! Provides the encryption/decryption abstraction used by the encrypted
//! store. The only backend is age (x25519 recipients, ASCII armor); the
//! trait keeps the store independent of it.

use ::age::x25519;
use zeroize::Zeroizing;

use crate::error::Result;

mod age;

pub use age::{parse_identity, parse_recipient, Age};

/// Cryptographic backend trait.
///
/// Recipients and identities are backend-specific; for age they are x25519
/// public keys and private keys.
pub trait Cipher {
    /// Type representing a recipient public key.
    type Recipient;

    /// Type representing a private identity/key.
    type Identity;

    /// Encrypt plaintext for every recipient.
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if encryption fails or `recipients` is empty.
    fn encrypt(&self, plaintext: &[u8], recipients: &[Self::Recipient]) -> Result<String>;

    /// Decrypt with whichever of `identities` matches a recipient stanza.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::NoMatchingKey` if none of the identities can
    /// decrypt, `CipherError::DecryptionFailed` for malformed input.
    fn decrypt(
        &self,
        encrypted: &str,
        identities: &[Self::Identity],
    ) -> Result<Zeroizing<Vec<u8>>>;

    /// Backend name for display/config.
    fn name(&self) -> &'static str;
}

/// Encrypt plaintext for multiple age recipients.
///
/// Convenience wrapper around `Age::encrypt`.
pub fn encrypt(plaintext: &[u8], recipients: &[x25519::Recipient]) -> Result<String> {
    Age.encrypt(plaintext, recipients)
}

/// Decrypt an age-armored ciphertext with any of `identities`.
///
/// Convenience wrapper around `Age::decrypt`.
pub fn decrypt(encrypted: &str, identities: &[x25519::Identity]) -> Result<Zeroizing<Vec<u8>>> {
    Age.decrypt(encrypted, identities)
}
