//! Curve keypairs. Node identifiers *are* curve public keys (spec §3); this
//! module is the only place that touches the X25519 scalar/point types,
//! mirroring how `lib-crypto::keypair` centralizes key generation away from
//! the rest of the workspace's crates.

use crate::identifier::Id;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// A local node's long-term X25519 keypair.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        KeyPair { secret, public }
    }

    /// Reconstructs a keypair from a raw 32-byte private scalar (as loaded
    /// from a `START`/`RESET` client command, see spec §6.4).
    pub fn from_secret_bytes(mut bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret);
        KeyPair { secret, public }
    }

    pub fn public_id(&self) -> Id {
        Id::from_bytes(*self.public.as_bytes())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_id())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Parses a raw 32-byte public key into an `Id`. Kept separate from `KeyPair`
/// since remote peers are known only by their public key, never a secret.
pub fn public_id_from_bytes(bytes: &[u8]) -> Option<Id> {
    if bytes.len() != 32 {
        return None;
    }
    Some(Id::from_slice(bytes))
}

/// Exposes the raw public key type for the framer, which needs to perform its
/// own Diffie–Hellman against an arbitrary peer's `Id`.
pub(crate) fn dh(secret: &StaticSecret, peer_public_id: &Id) -> [u8; 32] {
    let peer_public = PublicKey::from(*peer_public_id.as_bytes());
    secret.diffie_hellman(&peer_public).to_bytes()
}
