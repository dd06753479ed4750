//! Signed typed envelope for protocol messages
//!
//! The payload is signed on its own so the signer can be recovered from the
//! envelope bytes alone.

use super::types::CommunityDescription;
use crate::crypto::{recover_signer, sign, PrivateKey, PublicKey};
use crate::errors::{CommunityError, CommunityResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    CommunityDescription,
    CommunityEvents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message_type: MessageType,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedMessage {
    pub fn new(message_type: MessageType, payload: Vec<u8>, key: &PrivateKey) -> CommunityResult<Self> {
        let signature = sign(key, &payload)?;
        Ok(Self {
            message_type,
            payload,
            signature,
        })
    }

    pub fn signer(&self) -> CommunityResult<PublicKey> {
        Ok(recover_signer(&self.payload, &self.signature)?)
    }

    pub fn marshal(&self) -> CommunityResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn unmarshal(bytes: &[u8]) -> CommunityResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Serialize and sign a description, returning the envelope bytes
pub fn wrap_description(description: &CommunityDescription, key: &PrivateKey) -> CommunityResult<Vec<u8>> {
    let payload = bincode::serialize(description)?;
    SignedMessage::new(MessageType::CommunityDescription, payload, key)?.marshal()
}

/// Open a description envelope, returning the signer and the description
pub fn unwrap_description(bytes: &[u8]) -> CommunityResult<(PublicKey, CommunityDescription)> {
    let message = SignedMessage::unmarshal(bytes)?;
    if message.message_type != MessageType::CommunityDescription {
        return Err(CommunityError::InvalidMessage(
            "not a community description".to_string(),
        ));
    }

    let signer = message.signer()?;
    let description = bincode::deserialize(&message.payload)?;
    Ok((signer, description))
}

/// Open the base description of an events message; it must carry the
/// control node signature
pub fn validate_events_base(bytes: &[u8], control_node: &PublicKey) -> CommunityResult<CommunityDescription> {
    let (signer, description) = unwrap_description(bytes)?;
    if &signer != control_node {
        return Err(CommunityError::InvalidMessage(
            "community description was not signed by the control node".to_string(),
        ));
    }
    Ok(description)
}
