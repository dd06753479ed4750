//! Posting grants signed by the control node

use super::state::CommunityState;
use super::Community;
use crate::crypto::{recover_signer, sign, PublicKey, SIGNATURE_LENGTH};
use crate::errors::{CommunityError, CommunityResult};
use serde::{Deserialize, Serialize};

/// Proof that `member_id` may post in `chat_id` as of `clock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub community_id: Vec<u8>,
    pub member_id: Vec<u8>,
    pub chat_id: String,
    pub clock: u64,
}

impl CommunityState {
    /// Signature followed by the serialized grant
    pub(crate) fn build_grant(&self, member: &PublicKey, chat_id: &str) -> CommunityResult<Vec<u8>> {
        let key = match &self.private_key {
            Some(key) if self.is_control_node() => key,
            _ => return Err(CommunityError::NotControlNode),
        };

        let grant = Grant {
            community_id: self.id.compressed(),
            member_id: member.compressed(),
            chat_id: chat_id.to_string(),
            clock: self.description.clock,
        };
        let payload = bincode::serialize(&grant)?;
        let mut data = sign(key, &payload)?;
        data.extend_from_slice(&payload);
        Ok(data)
    }

    pub(crate) fn verify_grant(&self, data: &[u8]) -> CommunityResult<Grant> {
        if data.len() <= SIGNATURE_LENGTH {
            return Err(CommunityError::InvalidGrant);
        }
        let (signature, payload) = data.split_at(SIGNATURE_LENGTH);

        let grant: Grant = bincode::deserialize(payload).map_err(|_| CommunityError::InvalidGrant)?;
        if grant.clock == 0 || grant.member_id.is_empty() {
            return Err(CommunityError::InvalidGrant);
        }
        if grant.community_id != self.id.compressed() {
            return Err(CommunityError::InvalidGrant);
        }

        let signer = recover_signer(payload, signature).map_err(|_| CommunityError::InvalidGrant)?;
        if signer != self.control_node {
            return Err(CommunityError::InvalidGrant);
        }
        Ok(grant)
    }
}

impl Community {
    pub fn build_grant(&self, member: &PublicKey, chat_id: &str) -> CommunityResult<Vec<u8>> {
        self.lock().build_grant(member, chat_id)
    }

    pub fn verify_grant_signature(&self, data: &[u8]) -> CommunityResult<Grant> {
        self.lock().verify_grant(data)
    }
}
