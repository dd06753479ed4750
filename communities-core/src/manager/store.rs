//! Persistence contract for communities
//!
//! The description itself is stored as the opaque signed envelope; local
//! settings, pending events and requests to join live next to it.

use crate::community::{
    Community, CommunityConfig, CommunityState, EventsData, RequestToJoin, Shard, TimeSource,
};
use crate::crypto::{PrivateKey, PublicKey};
use crate::description::unwrap_description;
use crate::errors::CommunityResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// Everything persisted for one community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityRecord {
    /// Compressed community public key
    pub id: Vec<u8>,
    pub private_key: Option<Vec<u8>>,
    pub control_node: Vec<u8>,
    pub control_device: bool,
    /// Signed description envelope
    pub description_message: Vec<u8>,
    pub joined: bool,
    pub joined_at: u64,
    pub spectated: bool,
    pub verified: bool,
    pub muted: bool,
    pub muted_till: u64,
    pub last_opened_at: u64,
    pub requested_to_join_at: u64,
    pub shard: Option<Shard>,
    pub pubsub_topic_key: Option<Vec<u8>>,
    pub events: Option<EventsData>,
    pub last_applied_events: BTreeMap<String, u64>,
    pub requests_to_join: Vec<RequestToJoin>,
}

impl CommunityRecord {
    pub fn from_state(state: &CommunityState) -> Self {
        Self {
            id: state.id.compressed(),
            private_key: state.private_key.as_ref().map(PrivateKey::to_bytes),
            control_node: state.control_node.compressed(),
            control_device: state.control_device,
            description_message: state.description_message.clone(),
            joined: state.joined,
            joined_at: state.joined_at,
            spectated: state.spectated,
            verified: state.verified,
            muted: state.muted,
            muted_till: state.muted_till,
            last_opened_at: state.last_opened_at,
            requested_to_join_at: state.requested_to_join_at,
            shard: state.shard,
            pubsub_topic_key: state.pubsub_topic_key.as_ref().map(PrivateKey::to_bytes),
            events: state.events.clone(),
            last_applied_events: state.last_applied_events.clone(),
            requests_to_join: state.requests_to_join.clone(),
        }
    }

    /// Rebuild the aggregate, verifying the stored envelope on the way
    pub fn into_community(
        self,
        member_identity: PublicKey,
        time_source: Arc<dyn TimeSource>,
    ) -> CommunityResult<Community> {
        let (_, description) = unwrap_description(&self.description_message)?;
        let id = PublicKey::from_sec1_bytes(&self.id)?;

        let mut config = CommunityConfig::new(id, member_identity, description);
        config.private_key = self
            .private_key
            .as_deref()
            .map(PrivateKey::from_bytes)
            .transpose()?;
        config.control_node = Some(PublicKey::from_sec1_bytes(&self.control_node)?);
        config.control_device = self.control_device;
        config.description_message = self.description_message;
        config.joined = self.joined;
        config.joined_at = self.joined_at;
        config.spectated = self.spectated;
        config.verified = self.verified;
        config.muted = self.muted;
        config.muted_till = self.muted_till;
        config.last_opened_at = self.last_opened_at;
        config.requested_to_join_at = self.requested_to_join_at;
        config.shard = self.shard;
        config.pubsub_topic_key = self
            .pubsub_topic_key
            .as_deref()
            .map(PrivateKey::from_bytes)
            .transpose()?;
        config.events = self.events;
        config.last_applied_events = self.last_applied_events;
        config.requests_to_join = self.requests_to_join;

        Community::new(config, time_source)
    }
}

/// A token-owned community description waiting for owner verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityToValidate {
    pub id: Vec<u8>,
    pub clock: u64,
    pub payload: Vec<u8>,
    pub signer: Vec<u8>,
    pub validate_at: u64,
}

#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn save_community(&self, record: CommunityRecord) -> Result<(), StoreError>;

    async fn load_community(&self, id: &[u8]) -> Result<Option<CommunityRecord>, StoreError>;

    async fn delete_community(&self, id: &[u8]) -> Result<(), StoreError>;

    async fn all_communities(&self) -> Result<Vec<CommunityRecord>, StoreError>;

    async fn save_community_to_validate(&self, entry: CommunityToValidate) -> Result<(), StoreError>;

    async fn communities_to_validate(&self) -> Result<Vec<CommunityToValidate>, StoreError>;

    /// Drop one queued entry, identified by community and clock
    async fn delete_community_to_validate(&self, id: &[u8], clock: u64) -> Result<(), StoreError>;

    /// Drop every queued entry of a community
    async fn delete_communities_to_validate(&self, id: &[u8]) -> Result<(), StoreError>;
}

/// Store kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    communities: RwLock<HashMap<Vec<u8>, CommunityRecord>>,
    to_validate: RwLock<Vec<CommunityToValidate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.communities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.communities.read().await.is_empty()
    }
}

#[async_trait]
impl CommunityStore for InMemoryStore {
    async fn save_community(&self, record: CommunityRecord) -> Result<(), StoreError> {
        self.communities
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn load_community(&self, id: &[u8]) -> Result<Option<CommunityRecord>, StoreError> {
        Ok(self.communities.read().await.get(id).cloned())
    }

    async fn delete_community(&self, id: &[u8]) -> Result<(), StoreError> {
        self.communities
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(hex::encode(id)))
    }

    async fn all_communities(&self) -> Result<Vec<CommunityRecord>, StoreError> {
        Ok(self.communities.read().await.values().cloned().collect())
    }

    async fn save_community_to_validate(&self, entry: CommunityToValidate) -> Result<(), StoreError> {
        let mut queue = self.to_validate.write().await;
        queue.retain(|e| !(e.id == entry.id && e.clock == entry.clock));
        queue.push(entry);
        Ok(())
    }

    async fn communities_to_validate(&self) -> Result<Vec<CommunityToValidate>, StoreError> {
        Ok(self.to_validate.read().await.clone())
    }

    async fn delete_community_to_validate(&self, id: &[u8], clock: u64) -> Result<(), StoreError> {
        self.to_validate
            .write()
            .await
            .retain(|e| !(e.id == id && e.clock == clock));
        Ok(())
    }

    async fn delete_communities_to_validate(&self, id: &[u8]) -> Result<(), StoreError> {
        self.to_validate.write().await.retain(|e| e.id != id);
        Ok(())
    }
}
