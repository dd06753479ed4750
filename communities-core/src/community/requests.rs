//! Requests to join a community

use super::state::CommunityState;
use super::Community;
use crate::changes::CommunityChanges;
use crate::crypto::{keccak256, PublicKey};
use crate::description::{AccessType, MemberKey, RevealedAccount};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CommunityEvent, CommunityEventKind};
use serde::{Deserialize, Serialize};

/// Requests older than this are rejected
pub const REQUEST_TO_JOIN_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestToJoinState {
    #[default]
    Pending,
    Declined,
    Accepted,
    Canceled,
    AcceptedPending,
    DeclinedPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestToJoin {
    pub id: Vec<u8>,
    pub public_key: MemberKey,
    pub clock: u64,
    pub ens_name: String,
    pub chat_id: String,
    pub community_id: String,
    pub state: RequestToJoinState,
    pub revealed_accounts: Vec<RevealedAccount>,
}

impl RequestToJoin {
    pub fn new(member: &PublicKey, community_id: &str, clock: u64) -> Self {
        let public_key = member.to_hex();
        Self {
            id: calculate_request_id(&public_key, community_id),
            public_key,
            clock,
            community_id: community_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_revealed_accounts(mut self, accounts: Vec<RevealedAccount>) -> Self {
        self.revealed_accounts = accounts;
        self
    }

    pub fn with_ens_name(mut self, ens_name: impl Into<String>) -> Self {
        self.ens_name = ens_name.into();
        self
    }
}

/// `keccak256(member key ‖ community id)`
pub fn calculate_request_id(member_key: &str, community_id: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(member_key.len() + community_id.len());
    data.extend_from_slice(member_key.as_bytes());
    data.extend_from_slice(community_id.as_bytes());
    keccak256(&data).to_vec()
}

impl CommunityState {
    /// Record the decision on a request, inserting it if unknown
    pub(crate) fn set_request_state(&mut self, request: &RequestToJoin, state: RequestToJoinState) {
        match self.requests_to_join.iter_mut().find(|r| r.id == request.id) {
            Some(existing) => existing.state = state,
            None => {
                let mut request = request.clone();
                request.state = state;
                self.requests_to_join.push(request);
            }
        }
    }

    /// Requests decided by another privileged member wait for the control node
    pub(crate) fn record_pending_request_decision(&mut self, event: &CommunityEvent) {
        match &event.kind {
            CommunityEventKind::RequestToJoinAccept { request, .. } => {
                self.set_request_state(request, RequestToJoinState::AcceptedPending)
            }
            CommunityEventKind::RequestToJoinReject { request, .. } => {
                self.set_request_state(request, RequestToJoinState::DeclinedPending)
            }
            _ => {}
        }
    }

    /// The stored copy of `request` while it still awaits a decision
    pub(crate) fn undecided_request(&self, request: &RequestToJoin) -> Option<RequestToJoin> {
        self.requests_to_join
            .iter()
            .find(|r| r.id == request.id && r.public_key == request.public_key)
            .filter(|r| {
                matches!(
                    r.state,
                    RequestToJoinState::Pending
                        | RequestToJoinState::AcceptedPending
                        | RequestToJoinState::DeclinedPending
                )
            })
            .cloned()
    }

    pub(crate) fn request_is_unknown(&self, request: &RequestToJoin) -> bool {
        !self.requests_to_join.iter().any(|r| r.id == request.id)
    }

    fn request_by_id(&self, id: &[u8]) -> CommunityResult<RequestToJoin> {
        self.requests_to_join
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(CommunityError::RequestToJoinNotFound)
    }
}

impl Community {
    /// Store a request, replacing any previous one with the same id
    pub fn add_request_to_join(&self, request: RequestToJoin) {
        let mut state = self.lock();
        state.requests_to_join.retain(|r| r.id != request.id);
        state.requests_to_join.push(request);
    }

    pub fn requests_to_join(&self) -> Vec<RequestToJoin> {
        self.lock().requests_to_join.clone()
    }

    pub fn pending_requests_to_join(&self) -> Vec<RequestToJoin> {
        self.lock()
            .requests_to_join
            .iter()
            .filter(|r| r.state == RequestToJoinState::Pending)
            .cloned()
            .collect()
    }

    pub fn request_to_join(&self, id: &[u8]) -> Option<RequestToJoin> {
        self.lock().request_by_id(id).ok()
    }

    /// Mark the request of `member` accepted, if one is stored
    pub fn mark_request_to_join_accepted(&self, member: &PublicKey) -> bool {
        let mut state = self.lock();
        let id = calculate_request_id(&member.to_hex(), &state.id_string());
        match state.requests_to_join.iter_mut().find(|r| r.id == id) {
            Some(request) => {
                request.state = RequestToJoinState::Accepted;
                true
            }
            None => false,
        }
    }

    /// Check an incoming request against the community settings
    pub fn validate_request_to_join(&self, signer: &PublicKey, request: &RequestToJoin) -> CommunityResult<()> {
        let now = self.now();
        let state = self.lock();
        let description = &state.description;

        if request.public_key != signer.to_hex() {
            return Err(CommunityError::InvalidMessage(
                "request to join signed by another key".to_string(),
            ));
        }
        if request.clock + REQUEST_TO_JOIN_TIMEOUT_SECS < now {
            return Err(CommunityError::InvalidMessage("request to join expired".to_string()));
        }
        if description.is_banned(&request.public_key) {
            return Err(CommunityError::CantRequestAccess);
        }

        let permissions = description
            .permissions
            .as_ref()
            .ok_or(CommunityError::CantRequestAccess)?;
        if permissions.access == AccessType::Unknown {
            return Err(CommunityError::CantRequestAccess);
        }
        if permissions.ens_only && request.ens_name.is_empty() {
            return Err(CommunityError::CantRequestAccess);
        }

        if !request.chat_id.is_empty() {
            let chat = description
                .chats
                .get(&request.chat_id)
                .ok_or(CommunityError::ChatNotFound)?;
            let chat_permissions = chat
                .permissions
                .as_ref()
                .ok_or(CommunityError::CantRequestAccess)?;
            if chat_permissions.access != AccessType::ManualAccept {
                return Err(CommunityError::CantRequestAccess);
            }
            if chat_permissions.ens_only && request.ens_name.is_empty() {
                return Err(CommunityError::CantRequestAccess);
            }
        }

        Ok(())
    }

    pub fn accept_request_to_join(&self, request_id: &[u8]) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        let mut state = self.lock();
        let request = state.request_by_id(request_id)?;

        let kind = CommunityEventKind::RequestToJoinAccept {
            member: request.public_key.clone(),
            request: request.clone(),
        };
        let changes = state.perform(kind, now)?;
        if !state.is_control_node() {
            state.set_request_state(&request, RequestToJoinState::AcceptedPending);
        }
        Ok(changes)
    }

    pub fn decline_request_to_join(&self, request_id: &[u8]) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        let mut state = self.lock();
        let request = state.request_by_id(request_id)?;

        let kind = CommunityEventKind::RequestToJoinReject {
            member: request.public_key.clone(),
            request: request.clone(),
        };
        let changes = state.perform(kind, now)?;
        if !state.is_control_node() {
            state.set_request_state(&request, RequestToJoinState::DeclinedPending);
        }
        Ok(changes)
    }

    /// The requester withdrew; only pending requests can be canceled
    pub fn cancel_request_to_join(&self, request_id: &[u8]) -> CommunityResult<()> {
        let mut state = self.lock();
        let request = state.request_by_id(request_id)?;
        if request.state != RequestToJoinState::Pending {
            return Err(CommunityError::InvalidMessage(
                "request to join is no longer pending".to_string(),
            ));
        }
        state.set_request_state(&request, RequestToJoinState::Canceled);
        Ok(())
    }
}
