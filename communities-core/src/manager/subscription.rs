//! Notifications published by the manager

use crate::changes::CommunityChanges;
use crate::community::Community;
use std::sync::Arc;

/// One notification delivered to every subscriber
#[derive(Debug, Clone)]
pub enum Subscription {
    /// A community was created, updated or reloaded
    Community(Arc<Community>),
    /// Signed events this node produced, ready to be broadcast
    CommunityEventsMessage {
        community_id: Vec<u8>,
        payload: Vec<u8>,
    },
    /// A batch was built on a stale base; `description_message` is the
    /// current signed description the sender must rebase onto
    InvalidEventsClock {
        community_id: Vec<u8>,
        description_message: Vec<u8>,
    },
    /// A token-owned community passed owner verification
    TokenCommunityValidated {
        community: Arc<Community>,
        changes: CommunityChanges,
    },
    /// Members lost or gained roles during re-evaluation
    MembersReevaluated {
        community_id: Vec<u8>,
        changes: CommunityChanges,
    },
}

/// A community together with what an operation changed in it
#[derive(Debug, Clone)]
pub struct CommunityResponse {
    pub community: Arc<Community>,
    pub changes: CommunityChanges,
}
