// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - CRYPTOGRAPHY MODULE
//
// Ed25519 signing keys for accounts, delegates and certificate authorities.
// - Key generation (random and deterministic from seed material)
// - Message signing and verification
// - Address links (first 20 bytes of BLAKE2b-512 over the spending key)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use blake2::Blake2b512;
use digest::Digest;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

/// Ed25519 public key length in bytes
pub const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 secret key (seed) length in bytes
pub const SECRET_KEY_LEN: usize = 32;
/// Ed25519 signature length in bytes
pub const SIGNATURE_LEN: usize = 64;
/// Address link length: first 20 bytes of BLAKE2b-512
pub const ADDRESS_LINK_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKey,
    InvalidSeed,
    VerificationFailed,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CryptoError::InvalidKey => write!(f, "Invalid key format"),
            CryptoError::InvalidSeed => write!(f, "Seed must be at least 32 bytes"),
            CryptoError::VerificationFailed => write!(f, "Signature verification failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

/// Secret key bytes are wiped when the pair is dropped.
impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl KeyPair {
    /// Sign a message with this pair's secret key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sign_message(message, &self.secret_key)
    }

    /// Address link of the pay-to-key-hash script owned by this pair
    pub fn address_link(&self) -> Vec<u8> {
        address_link(&self.public_key)
    }
}

fn keypair_from_signing_key(signing_key: &SigningKey) -> KeyPair {
    KeyPair {
        public_key: signing_key.verifying_key().to_bytes().to_vec(),
        secret_key: signing_key.to_bytes().to_vec(),
    }
}

/// Generate a new random key pair from the OS RNG
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    keypair_from_signing_key(&signing_key)
}

/// Generate a DETERMINISTIC key pair from seed material.
///
/// Domain separation:
///   salt = SHA-256("ubic-ed25519-keygen-v1")
///   secret = SHA-256(salt || seed)
///
/// Same seed always yields the same key pair and address link.
pub fn generate_keypair_from_seed(seed: &[u8]) -> Result<KeyPair, CryptoError> {
    if seed.len() < 32 {
        return Err(CryptoError::InvalidSeed);
    }

    let salt = Sha256::digest(b"ubic-ed25519-keygen-v1");
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(seed);
    let mut derived: [u8; SECRET_KEY_LEN] = hasher.finalize().into();

    let signing_key = SigningKey::from_bytes(&derived);
    derived.zeroize();

    Ok(keypair_from_signing_key(&signing_key))
}

/// Reconstruct a key pair from raw secret key bytes
pub fn keypair_from_secret(secret_bytes: &[u8]) -> Result<KeyPair, CryptoError> {
    let mut secret: [u8; SECRET_KEY_LEN] = secret_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey)?;
    let signing_key = SigningKey::from_bytes(&secret);
    secret.zeroize();
    Ok(keypair_from_signing_key(&signing_key))
}

/// Sign a message using an Ed25519 secret key
pub fn sign_message(message: &[u8], secret_key_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut secret: [u8; SECRET_KEY_LEN] = secret_key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey)?;
    let signing_key = SigningKey::from_bytes(&secret);
    secret.zeroize();

    Ok(signing_key.sign(message).to_bytes().to_vec())
}

/// Verify an Ed25519 signature. Malformed keys or signatures verify as false.
pub fn verify_signature(message: &[u8], signature_bytes: &[u8], public_key_bytes: &[u8]) -> bool {
    let pk_array: [u8; PUBLIC_KEY_LEN] = match public_key_bytes.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let vk = match VerifyingKey::from_bytes(&pk_array) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = match Signature::from_slice(signature_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };

    vk.verify(message, &sig).is_ok()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ADDRESS LINKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ledger key of an account: BLAKE2b-512 of the spending script, first 20 bytes.
///
/// For pay-to-key-hash scripts the spending script is the raw public key,
/// so `address_link(public_key)` is the account a key controls.
pub fn address_link(script: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(script);
    let hash = hasher.finalize();
    hash[..ADDRESS_LINK_LEN].to_vec()
}

/// Lowercase hex helper for log lines, truncated to `max` characters
pub fn short_hex(bytes: &[u8], max: usize) -> String {
    let full = hex::encode(bytes);
    full[..full.len().min(max)].to_string()
}
