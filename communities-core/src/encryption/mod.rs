//! Encryption key management decisions
//!
//! This module only decides *what* should happen to community and channel
//! keys. Generating and delivering keys is left to a [`KeyDistributor`].

mod key_actions;

pub use key_actions::{
    evaluate_community_encryption_key_actions, EncryptionKeyAction, EncryptionKeyActionType,
    EncryptionKeyActions,
};

use crate::community::CommunityState;
use crate::errors::CommunityResult;
use async_trait::async_trait;

/// Generates and delivers ratchet keys for the actions evaluated on the
/// control node
#[async_trait]
pub trait KeyDistributor: Send + Sync {
    /// Create new key material where the actions require it
    async fn generate(&self, community: &CommunityState, actions: &EncryptionKeyActions) -> CommunityResult<()>;

    /// Deliver keys to the members named in the actions
    async fn distribute(&self, community: &CommunityState, actions: &EncryptionKeyActions) -> CommunityResult<()>;
}
