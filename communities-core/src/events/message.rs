//! Wire envelope carrying a batch of community events

use super::types::CommunityEvent;
use crate::crypto::PrivateKey;
use crate::description::{MessageType, SignedMessage};
use crate::errors::{CommunityError, CommunityResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommunityEvent {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl From<&CommunityEvent> for SignedCommunityEvent {
    fn from(event: &CommunityEvent) -> Self {
        Self {
            payload: event.payload.clone(),
            signature: event.signature.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CommunityEventsWire {
    community_id: Vec<u8>,
    events_base_description: Vec<u8>,
    events: Vec<SignedCommunityEvent>,
}

/// A community id, the control-node-signed base description and the events
/// to replay on top of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityEventsMessage {
    pub community_id: Vec<u8>,
    pub events_base_description: Vec<u8>,
    pub events: Vec<CommunityEvent>,
}

impl CommunityEventsMessage {
    pub fn marshal(&self) -> CommunityResult<Vec<u8>> {
        if let Some(unsigned) = self.events.iter().find(|e| !e.is_signed()) {
            return Err(CommunityError::InvalidEvent(format!(
                "event {} is not signed",
                unsigned.event_type_id()
            )));
        }

        let wire = CommunityEventsWire {
            community_id: self.community_id.clone(),
            events_base_description: self.events_base_description.clone(),
            events: self.events.iter().map(SignedCommunityEvent::from).collect(),
        };
        Ok(bincode::serialize(&wire)?)
    }

    pub fn unmarshal(bytes: &[u8]) -> CommunityResult<Self> {
        let wire: CommunityEventsWire = bincode::deserialize(bytes)?;
        let events = wire
            .events
            .into_iter()
            .map(|e| CommunityEvent::from_payload(e.payload, e.signature))
            .collect::<CommunityResult<Vec<_>>>()?;

        Ok(Self {
            community_id: wire.community_id,
            events_base_description: wire.events_base_description,
            events,
        })
    }

    /// Marshal and wrap in a signed envelope of type `CommunityEvents`
    pub fn to_signed_message(&self, key: &PrivateKey) -> CommunityResult<Vec<u8>> {
        SignedMessage::new(MessageType::CommunityEvents, self.marshal()?, key)?.marshal()
    }

    /// Open a signed envelope, returning the sender and the message
    pub fn from_signed_message(bytes: &[u8]) -> CommunityResult<(crate::crypto::PublicKey, Self)> {
        let message = SignedMessage::unmarshal(bytes)?;
        if message.message_type != MessageType::CommunityEvents {
            return Err(CommunityError::InvalidMessage(
                "not a community events message".to_string(),
            ));
        }
        let signer = message.signer()?;
        Ok((signer, Self::unmarshal(&message.payload)?))
    }
}
