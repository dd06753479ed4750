//! Recoverable signatures over Keccak-256

use super::{CryptoError, PrivateKey, PublicKey};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Length of a recoverable signature: `r || s || v`
pub const SIGNATURE_LENGTH: usize = 65;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Sign `keccak256(payload)` producing 65 bytes `r || s || v`
pub fn sign(key: &PrivateKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let digest = keccak256(payload);
    let (signature, recovery_id) = key
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
    out.extend_from_slice(&signature.to_bytes());
    out.push(recovery_id.to_byte());
    Ok(out)
}

/// Recover the public key that produced `signature` over `payload`
pub fn recover_signer(payload: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignatureLength(signature.len()));
    }

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| CryptoError::InvalidSignature("bad recovery id".to_string()))?;

    let digest = keccak256(payload);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    Ok(PublicKey::from_recovered(&key))
}
