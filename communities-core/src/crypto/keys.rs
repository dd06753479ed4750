//! Key types
//!
//! Member keys are rendered as `0x` + hex of the uncompressed SEC1 point,
//! community ids are the compressed point.

use super::CryptoError;
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

const COMPRESSED_LEN: usize = 33;
const UNCOMPRESSED_LEN: usize = 65;

/// A secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut rng = rand::rng();
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            // Out-of-range scalars are astronomically rare; draw again.
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return Self { key };
            }
        }
    }

    /// Restore a key from its 32 raw scalar bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { key })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.key.to_bytes().to_vec()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.key.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

/// A secp256k1 public key
///
/// Equality, ordering and hashing use the compressed encoding so the same
/// point always compares equal whichever encoding it was parsed from.
#[derive(Clone, Copy)]
pub struct PublicKey {
    compressed: [u8; COMPRESSED_LEN],
    uncompressed: [u8; UNCOMPRESSED_LEN],
}

impl PublicKey {
    fn from_verifying_key(key: &VerifyingKey) -> Self {
        let mut compressed = [0u8; COMPRESSED_LEN];
        compressed.copy_from_slice(key.to_encoded_point(true).as_bytes());
        let mut uncompressed = [0u8; UNCOMPRESSED_LEN];
        uncompressed.copy_from_slice(key.to_encoded_point(false).as_bytes());
        Self {
            compressed,
            uncompressed,
        }
    }

    /// Parse a compressed (33 bytes) or uncompressed (65 bytes) SEC1 point
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::from_verifying_key(&key))
    }

    /// Parse a `0x`-prefixed hex string of either SEC1 encoding
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(trimmed).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_sec1_bytes(&bytes)
    }

    pub fn compressed(&self) -> Vec<u8> {
        self.compressed.to_vec()
    }

    pub fn uncompressed(&self) -> Vec<u8> {
        self.uncompressed.to_vec()
    }

    /// Member key representation, `0x` + uncompressed point
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.uncompressed))
    }

    /// Community id representation, `0x` + compressed point
    pub fn to_compressed_hex(&self) -> String {
        format!("0x{}", hex::encode(self.compressed))
    }

    pub(crate) fn from_recovered(key: &VerifyingKey) -> Self {
        Self::from_verifying_key(key)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.compressed == other.compressed
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.compressed.hash(state);
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compressed.cmp(&other.compressed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_compressed_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct_keys() {
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_private_key_bytes_roundtrip() {
        let key = PrivateKey::generate();
        let restored = PrivateKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn test_public_key_encodings() {
        let pk = PrivateKey::generate().public_key();
        assert_eq!(pk.compressed().len(), 33);
        assert_eq!(pk.uncompressed().len(), 65);
        assert!(pk.to_hex().starts_with("0x04"));
        assert_eq!(pk.to_hex().len(), 2 + 130);
        assert_eq!(pk.to_compressed_hex().len(), 2 + 66);
    }

    #[test]
    fn test_from_hex_accepts_both_encodings() {
        let pk = PrivateKey::generate().public_key();
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert_eq!(PublicKey::from_hex(&pk.to_compressed_hex()).unwrap(), pk);
    }

    #[test]
    fn test_invalid_public_key() {
        assert!(PublicKey::from_hex("0xabc").is_err());
        assert!(PublicKey::from_sec1_bytes(&[0u8; 33]).is_err());
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }
}
