//! Age encryption backend implementation.
//!
//! Provides encryption/decryption using the age format with x25519 keys
//! and ASCII armor encoding.

use std::io::{Read, Write};

use ::age::x25519;
use tracing::trace;
use zeroize::Zeroizing;

use super::Cipher;
use crate::error::{CipherError, Result};

/// Age-based cryptographic backend using x25519 keys
pub struct Age;

impl Cipher for Age {
    type Recipient = x25519::Recipient;
    type Identity = x25519::Identity;

    fn name(&self) -> &'static str {
        "age"
    }

    fn encrypt(&self, plaintext: &[u8], recipients: &[x25519::Recipient]) -> Result<String> {
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        if recipients.is_empty() {
            return Err(CipherError::EncryptionFailed("no recipients".to_string()).into());
        }

        let encryptor =
            age::Encryptor::with_recipients(recipients.iter().map(|r| r as &dyn age::Recipient))
                .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                age::armor::Format::AsciiArmor,
            )?)
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        writer.write_all(plaintext)?;
        let armored = writer
            .finish()
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
        armored
            .finish()
            .map_err(|e| CipherError::ArmorFailed(format!("{}", e)))?;

        trace!(ciphertext_len = encrypted.len(), "encrypted");

        String::from_utf8(encrypted)
            .map_err(|e| CipherError::EncryptionFailed(format!("UTF-8 error: {}", e)).into())
    }

    fn decrypt(
        &self,
        encrypted: &str,
        identities: &[x25519::Identity],
    ) -> Result<Zeroizing<Vec<u8>>> {
        trace!(
            ciphertext_len = encrypted.len(),
            identities = identities.len(),
            "decrypting"
        );

        let reader = age::armor::ArmoredReader::new(encrypted.as_bytes());
        let decryptor = age::Decryptor::new(reader)
            .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

        let mut decrypted = Zeroizing::new(Vec::new());
        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| match e {
                age::DecryptError::NoMatchingKeys => CipherError::NoMatchingKey,
                other => CipherError::DecryptionFailed(format!("{}", other)),
            })?;

        reader.read_to_end(&mut decrypted)?;

        trace!(plaintext_len = decrypted.len(), "decrypted");

        Ok(decrypted)
    }
}

/// Parse a public key string into an age recipient
///
/// # Errors
///
/// Returns `CipherError::InvalidPublicKey` if the key format is invalid.
pub fn parse_recipient(key: &str) -> Result<x25519::Recipient> {
    key.trim()
        .parse::<x25519::Recipient>()
        .map_err(|_| CipherError::InvalidPublicKey(key.to_string()).into())
}

/// Parse an `AGE-SECRET-KEY-...` string into an age identity
///
/// # Errors
///
/// Returns `StoreError::InvalidFormat` if the key format is invalid.
pub fn parse_identity(key: &str) -> Result<x25519::Identity> {
    key.trim()
        .parse::<x25519::Identity>()
        .map_err(|e: &str| crate::error::StoreError::InvalidFormat(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = Age;
        let identity = x25519::Identity::generate();
        let recipient = identity.to_public();

        let plaintext = b"hello\n";
        let encrypted = cipher.encrypt(plaintext, &[recipient]).unwrap();

        assert!(encrypted.contains("-----BEGIN AGE ENCRYPTED FILE-----"));

        let decrypted = cipher.decrypt(&encrypted, &[identity]).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_encrypt_binary_payload() {
        let cipher = Age;
        let identity = x25519::Identity::generate();

        let plaintext: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let encrypted = cipher.encrypt(&plaintext, &[identity.to_public()]).unwrap();

        let decrypted = cipher.decrypt(&encrypted, &[identity]).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn test_decrypt_with_any_matching_identity() {
        let cipher = Age;

        let alice = x25519::Identity::generate();
        let bob = x25519::Identity::generate();
        let stranger = x25519::Identity::generate();

        let encrypted = cipher.encrypt(b"shared", &[bob.to_public()]).unwrap();

        // The keyring holds a non-matching key first; the matching one still works.
        let decrypted = cipher.decrypt(&encrypted, &[stranger, bob]).unwrap();
        assert_eq!(decrypted.as_slice(), b"shared");

        let err = cipher.decrypt(&encrypted, &[alice]).unwrap_err();
        assert!(matches!(err, Error::Cipher(CipherError::NoMatchingKey)));
    }

    #[test]
    fn test_encrypt_without_recipients_fails() {
        assert!(Age.encrypt(b"x", &[]).is_err());
    }

    #[test]
    fn test_parse_recipient_rejects_garbage() {
        assert!(parse_recipient("not-a-key").is_err());
        let identity = x25519::Identity::generate();
        assert!(parse_recipient(&identity.to_public().to_string()).is_ok());
    }
}
