//! Community aggregate
//!
//! A [`Community`] wraps one replicated description plus the local-only
//! state of this device. Every operation takes the single community lock
//! for its whole duration, so operations on one community are totally
//! ordered. Nothing in here performs I/O.
//!
//! The control node mutates the description directly and advances its
//! Lamport clock. Privileged members on other devices record signed
//! events instead, see [`crate::events`].

mod categories;
mod clock;
mod grants;
mod mutators;
mod operations;
mod requests;
mod state;
mod views;

pub use clock::{next_clock, ManualTimeSource, SystemTimeSource, TimeSource};
pub use grants::Grant;
pub use requests::{
    calculate_request_id, RequestToJoin, RequestToJoinState, REQUEST_TO_JOIN_TIMEOUT_SECS,
};
pub use state::{evaluate_changes, CommunityState, EventsData, Shard};
pub use views::CommunityMemberState;

use crate::changes::CommunityChanges;
use crate::crypto::{PrivateKey, PublicKey};
use crate::description::{validate_description, CommunityDescription};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CommunityEvent, CommunityEventsMessage, EventsProcessor, ProcessedEvents};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Everything needed to build a [`Community`]
#[derive(Debug, Clone)]
pub struct CommunityConfig {
    pub id: PublicKey,
    pub private_key: Option<PrivateKey>,
    /// Defaults to the community id
    pub control_node: Option<PublicKey>,
    pub control_device: bool,
    pub member_identity: PublicKey,
    pub description: CommunityDescription,
    pub description_message: Vec<u8>,
    pub joined: bool,
    pub joined_at: u64,
    pub spectated: bool,
    pub verified: bool,
    pub muted: bool,
    pub muted_till: u64,
    pub requested_to_join_at: u64,
    pub last_opened_at: u64,
    pub events: Option<EventsData>,
    pub last_applied_events: BTreeMap<String, u64>,
    pub requests_to_join: Vec<RequestToJoin>,
    pub shard: Option<Shard>,
    pub pubsub_topic_key: Option<PrivateKey>,
}

impl CommunityConfig {
    pub fn new(id: PublicKey, member_identity: PublicKey, description: CommunityDescription) -> Self {
        Self {
            id,
            private_key: None,
            control_node: None,
            control_device: false,
            member_identity,
            description,
            description_message: Vec::new(),
            joined: false,
            joined_at: 0,
            spectated: false,
            verified: false,
            muted: false,
            muted_till: 0,
            requested_to_join_at: 0,
            last_opened_at: 0,
            events: None,
            last_applied_events: BTreeMap::new(),
            requests_to_join: Vec::new(),
            shard: None,
            pubsub_topic_key: None,
        }
    }
}

pub struct Community {
    state: Mutex<CommunityState>,
    time_source: Arc<dyn TimeSource>,
}

impl fmt::Debug for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Community")
            .field("id", &state.id_string())
            .field("clock", &state.description.clock)
            .field("control_node", &state.is_control_node())
            .finish()
    }
}

impl Community {
    pub fn new(config: CommunityConfig, time_source: Arc<dyn TimeSource>) -> CommunityResult<Self> {
        validate_description(&config.description)?;

        let state = CommunityState {
            id: config.id,
            private_key: config.private_key,
            control_node: config.control_node.unwrap_or(config.id),
            control_device: config.control_device,
            member_identity: config.member_identity,
            description: config.description,
            description_message: config.description_message,
            events: config.events,
            last_applied_events: config.last_applied_events,
            requests_to_join: config.requests_to_join,
            joined: config.joined,
            joined_at: config.joined_at,
            spectated: config.spectated,
            muted: config.muted,
            muted_till: config.muted_till,
            verified: config.verified,
            last_opened_at: config.last_opened_at,
            requested_to_join_at: config.requested_to_join_at,
            shard: config.shard,
            pubsub_topic_key: config.pubsub_topic_key,
        };

        let mut community = Self::from_state(state, time_source);
        if community.state.get_mut().description_message.is_empty() {
            community.state.get_mut().refresh_description_message()?;
        }
        Ok(community)
    }

    pub(crate) fn from_state(state: CommunityState, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            state: Mutex::new(state),
            time_source,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CommunityState> {
        self.state.lock()
    }

    pub(crate) fn now(&self) -> u64 {
        self.time_source.now_secs()
    }

    pub fn id(&self) -> PublicKey {
        self.lock().id
    }

    pub fn id_string(&self) -> String {
        self.lock().id_string()
    }

    pub fn chat_id(&self, channel_id: &str) -> String {
        self.lock().chat_id(channel_id)
    }

    pub fn clock(&self) -> u64 {
        self.lock().description.clock
    }

    pub fn control_node(&self) -> PublicKey {
        self.lock().control_node
    }

    pub fn is_control_node(&self) -> bool {
        self.lock().is_control_node()
    }

    pub fn member_identity(&self) -> PublicKey {
        self.lock().member_identity
    }

    /// Independent copy of the full state
    pub fn snapshot(&self) -> CommunityState {
        self.lock().clone()
    }

    pub fn private_key(&self) -> Option<PrivateKey> {
        self.lock().private_key.clone()
    }

    pub fn set_private_key(&self, key: Option<PrivateKey>) {
        self.lock().private_key = key;
    }

    pub fn set_control_node(&self, control_node: PublicKey) {
        self.lock().control_node = control_node;
    }

    pub fn set_control_device(&self, control_device: bool) {
        self.lock().control_device = control_device;
    }

    pub fn join(&self) {
        let now = self.now();
        let mut state = self.lock();
        state.joined = true;
        state.joined_at = now;
        state.spectated = false;
    }

    pub fn leave(&self) {
        let mut state = self.lock();
        state.joined = false;
        state.spectated = false;
    }

    pub fn spectate(&self) {
        self.lock().spectated = true;
    }

    pub fn joined(&self) -> bool {
        self.lock().joined
    }

    pub fn joined_at(&self) -> u64 {
        self.lock().joined_at
    }

    pub fn spectated(&self) -> bool {
        self.lock().spectated
    }

    /// Mute until `till` (seconds), 0 for indefinitely
    pub fn set_muted(&self, muted: bool, till: u64) {
        let mut state = self.lock();
        state.muted = muted;
        state.muted_till = if muted { till } else { 0 };
    }

    pub fn muted(&self) -> bool {
        self.lock().muted
    }

    pub fn muted_till(&self) -> u64 {
        self.lock().muted_till
    }

    pub fn set_verified(&self, verified: bool) {
        self.lock().verified = verified;
    }

    pub fn verified(&self) -> bool {
        self.lock().verified
    }

    pub fn set_last_opened_at(&self, at: u64) {
        self.lock().last_opened_at = at;
    }

    pub fn last_opened_at(&self) -> u64 {
        self.lock().last_opened_at
    }

    pub fn set_requested_to_join_at(&self, at: u64) {
        self.lock().requested_to_join_at = at;
    }

    pub fn requested_to_join_at(&self) -> u64 {
        self.lock().requested_to_join_at
    }

    pub fn shard(&self) -> Option<Shard> {
        self.lock().shard
    }

    pub fn set_shard(&self, shard: Option<Shard>) {
        self.lock().shard = shard;
    }

    pub fn pubsub_topic_key(&self) -> Option<PrivateKey> {
        self.lock().pubsub_topic_key.clone()
    }

    pub fn set_pubsub_topic_key(&self, key: Option<PrivateKey>) {
        self.lock().pubsub_topic_key = key;
    }

    /// Signed envelope of the current description. The control node signs
    /// it fresh, everyone else returns what they last received.
    pub fn to_protocol_message_bytes(&self) -> CommunityResult<Vec<u8>> {
        let mut state = self.lock();
        state.refresh_description_message()?;
        Ok(state.description_message.clone())
    }

    /// Last-writer-wins replacement of the whole description.
    ///
    /// Descriptions not newer than the current one are ignored without an
    /// error. Accepted descriptions supersede pending events.
    pub fn update_community_description(
        &self,
        description: CommunityDescription,
        raw_message: Vec<u8>,
        new_control_node: Option<PublicKey>,
    ) -> CommunityResult<CommunityChanges> {
        validate_description(&description)?;

        let mut state = self.lock();
        if description.clock <= state.description.clock {
            debug!(
                community_id = %state.id_string(),
                clock = description.clock,
                current = state.description.clock,
                "ignoring outdated community description"
            );
            return Ok(CommunityChanges::empty(state.id_string()));
        }

        let origin = state.clone();
        state.description = description;
        state.description_message = raw_message;
        state.events = None;
        if let Some(control_node) = new_control_node {
            state.control_node = control_node;
        }

        if !(state.joined || state.spectated || state.requested_to_join_at > 0) {
            return Ok(CommunityChanges::empty(state.id_string()));
        }

        let mut changes = evaluate_changes(&origin, &state);
        let me = state.member_key();
        if state.joined && changes.has_member_left(&me) {
            changes.member_kicked = true;
        }
        if !state.joined && state.requested_to_join_at > 0 && changes.has_new_member(&me) {
            changes.should_member_join = true;
        }
        Ok(changes)
    }

    /// Run an incoming events batch through the pipeline
    pub fn process_events(&self, message: &CommunityEventsMessage) -> CommunityResult<ProcessedEvents> {
        let now = self.now();
        let mut state = self.lock();
        if message.community_id != state.id.compressed() {
            return Err(CommunityError::InvalidMessage(
                "events message for another community".to_string(),
            ));
        }

        let processed = EventsProcessor::new(&mut state, message, now).exec()?;
        state.refresh_description_message()?;
        Ok(processed)
    }

    /// Sign every pending event that has no signature yet
    pub fn sign_events(&self, key: &PrivateKey) -> CommunityResult<()> {
        let mut state = self.lock();
        if let Some(data) = state.events.as_mut() {
            for event in data.events.iter_mut().filter(|e| !e.is_signed()) {
                event.sign(key)?;
            }
        }
        Ok(())
    }

    pub fn pending_events(&self) -> Vec<CommunityEvent> {
        self.lock()
            .events
            .as_ref()
            .map(|data| data.events.clone())
            .unwrap_or_default()
    }

    pub fn events_data(&self) -> Option<EventsData> {
        self.lock().events.clone()
    }

    pub fn clear_pending_events(&self) {
        self.lock().events = None;
    }

    /// Wire envelope of the pending events, `None` when nothing is pending
    pub fn to_events_message(&self) -> Option<CommunityEventsMessage> {
        let state = self.lock();
        state.events.as_ref().map(|data| CommunityEventsMessage {
            community_id: state.id.compressed(),
            events_base_description: data.events_base_description.clone(),
            events: data.events.clone(),
        })
    }

    /// The description with pending events replayed on top
    pub fn preview_description(&self) -> CommunityDescription {
        self.lock().preview().description
    }
}
