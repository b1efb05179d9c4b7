//! ECDH(P-256) + HKDF-SHA256 + AES-EAX session crypto.
//!
//! Both sides generate an ephemeral P-256 keypair, exchange public keys as
//! DER-encoded `SubjectPublicKeyInfo` blobs, and derive a shared AES-256 key
//! from the ECDH shared secret's X-coordinate via HKDF-SHA256 with an empty
//! salt and the fixed info string `"ecdh-aesgcm"`. Every frame encrypted
//! under the resulting session key uses the same 16-byte nonce
//! (`"0000000000000000"`): safe here because keys are single-use and
//! discarded when the connection drops, not because nonce reuse is safe in
//! general.

use aes::Aes256;
use eax::aead::{Aead, KeyInit, Payload};
use eax::Eax;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::PublicKey;
use sha2::Sha256;
use zeroize::Zeroize;

/// The session-wide fixed AES-EAX nonce.
pub const FIXED_NONCE: [u8; 16] = *b"0000000000000000";
const HKDF_INFO: &[u8] = b"ecdh-aesgcm";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (tampered ciphertext or wrong key)")]
    Decrypt,
}

/// An ephemeral P-256 keypair used for exactly one handshake.
pub struct Keypair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut rand::thread_rng());
        let public = secret.public_key();
        Self { secret, public }
    }

    /// DER-encodes the public half as a `SubjectPublicKeyInfo`, the form
    /// exchanged over the wire during the handshake.
    pub fn public_der(&self) -> Vec<u8> {
        self.public
            .to_public_key_der()
            .expect("P-256 public key DER encoding cannot fail")
            .as_bytes()
            .to_vec()
    }

    /// Runs ECDH against a peer's DER-encoded public key and derives the
    /// session's AES-256 key.
    pub fn derive_session_key(&self, peer_public_der: &[u8]) -> Result<[u8; 32], CryptoError> {
        let peer = PublicKey::from_public_key_der(peer_public_der)
            .map_err(|_| CryptoError::MalformedPublicKey)?;
        let shared = self.secret.diffie_hellman(&peer);
        derive_key(shared.raw_secret_bytes().as_slice())
    }
}

/// HKDF-SHA256(salt = empty, ikm = shared X-coordinate, info = "ecdh-aesgcm") -> 32 bytes.
fn derive_key(shared_x: &[u8]) -> Result<[u8; 32], CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, shared_x);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}

/// A live, keyed AES-EAX session. Holds the derived key only; zeroized on
/// drop.
pub struct Session {
    key: [u8; 32],
}

impl Drop for Session {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl Session {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Eax<Aes256> {
        Eax::new_from_slice(&self.key).expect("32-byte key is always valid for AES-256-EAX")
    }

    /// Encrypts `plaintext` under the fixed session nonce. The returned
    /// bytes are ciphertext with the 16-byte authentication tag appended,
    /// the `eax` crate's in-place combined format.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.cipher()
            .encrypt(
                (&FIXED_NONCE).into(),
                Payload {
                    msg: plaintext,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::Encrypt)
    }

    /// Decrypts and authenticates `ciphertext` (tag appended) under the
    /// fixed session nonce.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.cipher()
            .decrypt(
                (&FIXED_NONCE).into(),
                Payload {
                    msg: ciphertext,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::Decrypt)
    }
}
