// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AES-256-GCM envelope sealing.
//!
//! Each write draws a fresh data key (DEK). The DEK encrypts the content and
//! the process key (KEK) encrypts the DEK. Both operations bind the same
//! associated data, so a sealed value only opens under the name it was
//! sealed for.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Cipher advertised for both envelope layers.
pub const CIPHER: &str = "aes-256-gcm";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("invalid key length")]
    Key,
    #[error("encryption failed")]
    Seal,
    #[error("authentication failed")]
    Open,
}

#[derive(Clone)]
pub(crate) struct Sealed {
    content: Vec<u8>,
    content_nonce: [u8; NONCE_LEN],
    wrapped_dek: Vec<u8>,
    wrap_nonce: [u8; NONCE_LEN],
}

/// Process-lifetime key-encryption key. Zeroed on drop.
pub(crate) struct Kek(Zeroizing<[u8; KEY_LEN]>);

fn random_key() -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut key[..]);
    key
}

impl Kek {
    pub(crate) fn generate() -> Self {
        Self(random_key())
    }

    pub(crate) fn seal(&self, aad: &str, plaintext: &[u8]) -> Result<Sealed, EnvelopeError> {
        let dek = random_key();
        let content_nonce = random_nonce();
        let wrap_nonce = random_nonce();

        let content = encrypt(&dek[..], &content_nonce, plaintext, aad)?;
        let wrapped_dek = encrypt(&self.0[..], &wrap_nonce, &dek[..], aad)?;
        Ok(Sealed { content, content_nonce, wrapped_dek, wrap_nonce })
    }

    /// Decrypted plaintext, zeroed when the caller drops it.
    pub(crate) fn open(&self, aad: &str, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
        let dek = Zeroizing::new(decrypt(&self.0[..], &sealed.wrap_nonce, &sealed.wrapped_dek, aad)?);
        decrypt(&dek, &sealed.content_nonce, &sealed.content, aad).map(Zeroizing::new)
    }
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn encrypt(key: &[u8], nonce: &[u8; NONCE_LEN], msg: &[u8], aad: &str) -> Result<Vec<u8>, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Key)?;
    cipher.encrypt(Nonce::from_slice(nonce), Payload { msg, aad: aad.as_bytes() }).map_err(|_| EnvelopeError::Seal)
}

fn decrypt(key: &[u8], nonce: &[u8; NONCE_LEN], msg: &[u8], aad: &str) -> Result<Vec<u8>, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::Key)?;
    cipher.decrypt(Nonce::from_slice(nonce), Payload { msg, aad: aad.as_bytes() }).map_err(|_| EnvelopeError::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let kek = Kek::generate();
        let sealed = kek.seal("db_password", b"s3cr3t").unwrap();
        assert_eq!(kek.open("db_password", &sealed).unwrap().as_slice(), b"s3cr3t");
    }

    #[test]
    fn wrong_aad_fails_to_open() {
        let kek = Kek::generate();
        let sealed = kek.seal("db_password", b"s3cr3t").unwrap();
        assert_eq!(kek.open("api_token", &sealed).unwrap_err(), EnvelopeError::Open);
    }

    #[test]
    fn other_kek_fails_to_open() {
        let sealed = Kek::generate().seal("db_password", b"s3cr3t").unwrap();
        assert_eq!(Kek::generate().open("db_password", &sealed).unwrap_err(), EnvelopeError::Open);
    }

    #[test]
    fn every_seal_uses_fresh_material() {
        let kek = Kek::generate();
        let a = kek.seal("n", b"same").unwrap();
        let b = kek.seal("n", b"same").unwrap();
        assert_ne!(a.content_nonce, b.content_nonce);
        assert_ne!(a.wrapped_dek, b.wrapped_dek);
        assert_ne!(a.content, b.content);
    }

    #[test]
    fn opened_plaintext_is_a_zeroizing_buffer() {
        use zeroize::Zeroize;

        let kek = Kek::generate();
        let sealed = kek.seal("n", b"value").unwrap();
        let mut plain: Zeroizing<Vec<u8>> = kek.open("n", &sealed).unwrap();
        assert_eq!(plain.as_slice(), b"value");
        plain.zeroize();
        assert!(plain.is_empty());
    }

    #[test]
    fn flipped_ciphertext_bit_fails() {
        let kek = Kek::generate();
        let mut sealed = kek.seal("n", b"value").unwrap();
        sealed.content[0] ^= 0x01;
        assert_eq!(kek.open("n", &sealed).unwrap_err(), EnvelopeError::Open);
    }
}
