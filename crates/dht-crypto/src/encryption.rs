//! Curve-authenticated encryption for the transport framer (spec §4.4).
//!
//! Diffie–Hellman over X25519 derives a shared secret between sender and
//! recipient; HKDF-SHA256 turns that into a symmetric key; XChaCha20-Poly1305
//! authenticates and encrypts the payload with a fresh 24-byte random nonce
//! prefixed to the ciphertext — the "authenticated-box primitive" spec.md
//! leaves unnamed. Grounded in `lib-crypto::symmetric::chacha20`'s
//! encrypt/decrypt shape (nonce-prefixed output, `Result<Vec<u8>>` signature)
//! and `lib-crypto::kdf::hkdf`, generalized from a pre-shared key to a DH'd one.

use crate::identifier::Id;
use crate::keys::{dh, KeyPair};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use thiserror::Error;

const NONCE_LEN: usize = 24;
const HKDF_INFO: &[u8] = b"peerz-dht-transport-v1";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
    #[error("authenticated decryption failed")]
    AuthenticationFailed,
}

fn derive_key(shared_secret: &[u8; 32]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    // HKDF output is always full-length for a 32-byte request; this cannot fail.
    hk.expand(HKDF_INFO, &mut key).expect("32-byte HKDF expand");
    key
}

/// Encrypts `plaintext` from `local` to `recipient`, returning
/// `nonce (24 bytes) || ciphertext`.
pub fn seal(local: &KeyPair, recipient: &Id, plaintext: &[u8]) -> Vec<u8> {
    let shared = dh(local.secret(), recipient);
    let key = derive_key(&shared);
    let cipher = XChaCha20Poly1305::new((&key).into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    // Key material is 32 bytes from a fresh HKDF expand; encryption over a
    // well-formed key/nonce pair does not fail.
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("XChaCha20Poly1305 encryption");

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts a blob produced by [`seal`], authenticating that it was sealed by
/// `sender`'s matching secret key to `local`.
pub fn open(local: &KeyPair, sender: &Id, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::Truncated);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let shared = dh(local.secret(), sender);
    let key = derive_key(&shared);
    let cipher = XChaCha20Poly1305::new((&key).into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let sealed = seal(&alice, &bob.public_id(), b"hello kademlia");
        let opened = open(&bob, &alice.public_id(), &sealed).unwrap();
        assert_eq!(opened, b"hello kademlia");
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let mut sealed = seal(&alice, &bob.public_id(), b"hello kademlia");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(matches!(
            open(&bob, &alice.public_id(), &sealed),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let bob = KeyPair::generate();
        let alice_id = KeyPair::generate().public_id();
        assert!(matches!(
            open(&bob, &alice_id, &[0u8; 4]),
            Err(CryptoError::Truncated)
        ));
    }

    #[test]
    fn wrong_recipient_cannot_decrypt() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let mallory = KeyPair::generate();

        let sealed = seal(&alice, &bob.public_id(), b"secret");
        assert!(open(&mallory, &alice.public_id(), &sealed).is_err());
    }
}
