//! secp256k1 identities and Keccak-256 signatures
//!
//! Community ids, member keys, grants, events and description envelopes all
//! rely on the same recoverable-signature contract: a 65-byte `r || s || v`
//! signature over `keccak256(payload)` from which the signer's public key can
//! be recovered without any transport metadata.

mod error;
mod keys;
mod signing;

pub use error::CryptoError;
pub use keys::{PrivateKey, PublicKey};
pub use signing::{keccak256, recover_signer, sign, SIGNATURE_LENGTH};
