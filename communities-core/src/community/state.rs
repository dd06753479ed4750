//! State guarded by the community lock

use super::clock::next_clock;
use super::requests::RequestToJoin;
use crate::changes::{diff_descriptions, CommunityChanges};
use crate::crypto::{PrivateKey, PublicKey};
use crate::description::{wrap_description, CommunityDescription, MemberKey, MemberRole};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CommunityEvent, CommunityEventKind, EventType};
use crate::roles::{can_roles_perform_event, is_privileged, roles_authorized_to_perform_event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Pubsub shard a community is published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub cluster: u16,
    pub index: u16,
}

/// Pending events and the signed description they were built on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsData {
    pub events_base_description: Vec<u8>,
    pub events: Vec<CommunityEvent>,
}

/// Everything a community holds, replicated or local.
///
/// Cloning yields an independent snapshot, which is what diffing and key
/// evaluation work on.
#[derive(Debug, Clone)]
pub struct CommunityState {
    pub(crate) id: PublicKey,
    pub(crate) private_key: Option<PrivateKey>,
    pub(crate) control_node: PublicKey,
    pub(crate) control_device: bool,
    pub(crate) member_identity: PublicKey,

    pub(crate) description: CommunityDescription,
    /// Signed envelope of `description`
    pub(crate) description_message: Vec<u8>,

    pub(crate) events: Option<EventsData>,
    pub(crate) last_applied_events: BTreeMap<String, u64>,
    pub(crate) requests_to_join: Vec<RequestToJoin>,

    pub(crate) joined: bool,
    pub(crate) joined_at: u64,
    pub(crate) spectated: bool,
    pub(crate) muted: bool,
    pub(crate) muted_till: u64,
    pub(crate) verified: bool,
    pub(crate) last_opened_at: u64,
    pub(crate) requested_to_join_at: u64,
    pub(crate) shard: Option<Shard>,
    pub(crate) pubsub_topic_key: Option<PrivateKey>,
}

impl CommunityState {
    pub fn id(&self) -> PublicKey {
        self.id
    }

    pub fn id_string(&self) -> String {
        self.id.to_compressed_hex()
    }

    /// Full chat id of a channel
    pub fn chat_id(&self, channel_id: &str) -> String {
        format!("{}{}", self.id_string(), channel_id)
    }

    pub fn description(&self) -> &CommunityDescription {
        &self.description
    }

    pub fn clock(&self) -> u64 {
        self.description.clock
    }

    pub fn control_node(&self) -> PublicKey {
        self.control_node
    }

    pub fn member_identity(&self) -> PublicKey {
        self.member_identity
    }

    pub fn member_key(&self) -> MemberKey {
        self.member_identity.to_hex()
    }

    pub fn events(&self) -> Option<&EventsData> {
        self.events.as_ref()
    }

    pub fn last_applied_events(&self) -> &BTreeMap<String, u64> {
        &self.last_applied_events
    }

    pub fn requests_to_join(&self) -> &[RequestToJoin] {
        &self.requests_to_join
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Own key matches the control node and this device holds control
    pub fn is_control_node(&self) -> bool {
        self.control_device
            && self
                .private_key
                .as_ref()
                .is_some_and(|k| k.public_key() == self.control_node)
    }

    pub fn own_roles(&self) -> &[MemberRole] {
        self.description.member_roles(&self.member_key())
    }

    pub fn is_privileged_member(&self, key: &PublicKey) -> bool {
        is_privileged(self.description.member_roles(&key.to_hex()))
    }

    /// Non-control-node privileged members express mutations as events
    pub fn has_permission_to_send_event(&self, event_type: EventType) -> bool {
        !self.is_control_node() && can_roles_perform_event(self.own_roles(), event_type)
    }

    pub(crate) fn increase_clock(&mut self, now: u64) {
        self.description.clock = next_clock(self.description.clock, now);
    }

    /// Clock for a new event, ahead of the description and of every
    /// pending event
    pub(crate) fn next_event_clock(&self, now: u64) -> u64 {
        let pending = self
            .events
            .as_ref()
            .and_then(|data| data.events.iter().map(|e| e.clock).max())
            .unwrap_or(0);
        next_clock(self.description.clock.max(pending), now)
    }

    /// Allowed, or `NotAuthorized`; `Ok(true)` when acting as control node
    pub(crate) fn authorize(&self, event_type: EventType) -> CommunityResult<bool> {
        if self.is_control_node() {
            Ok(true)
        } else if self.has_permission_to_send_event(event_type) {
            Ok(false)
        } else {
            Err(CommunityError::NotAuthorized)
        }
    }

    /// Validate an incoming event against current roles.
    ///
    /// With `last_applied`, events not newer than the last applied event of
    /// the same target are rejected as outdated.
    pub(crate) fn validate_event(
        &self,
        event: &CommunityEvent,
        last_applied: Option<&BTreeMap<String, u64>>,
    ) -> CommunityResult<()> {
        if let Some(applied) = last_applied.and_then(|m| m.get(&event.event_type_id())) {
            if *applied >= event.clock {
                return Err(CommunityError::InvalidEvent(format!(
                    "outdated event, last applied clock {}",
                    applied
                )));
            }
        }

        let signer = event.recover_signer()?;
        event.validate()?;

        let sender = self
            .description
            .member(&signer.to_hex())
            .ok_or(CommunityError::MemberNotFound)?;

        let target_roles = event
            .member_to_action()
            .map(|m| self.description.member_roles(m))
            .unwrap_or(&[]);

        if !roles_authorized_to_perform_event(&sender.roles, target_roles, event) {
            return Err(CommunityError::NotAuthorized);
        }
        Ok(())
    }

    /// Append a locally created event; the first one pins the current
    /// signed description as the base
    pub(crate) fn add_new_event(&mut self, event: CommunityEvent) -> CommunityResult<()> {
        if self.events.is_none() {
            if self.description_message.is_empty() {
                return Err(CommunityError::InvalidMessage(
                    "no signed description to base events on".to_string(),
                ));
            }
            self.events = Some(EventsData {
                events_base_description: self.description_message.clone(),
                events: Vec::new(),
            });
        }
        if let Some(data) = self.events.as_mut() {
            data.events.push(event);
        }
        Ok(())
    }

    /// Authoritative state with pending events replayed on top
    pub(crate) fn preview(&self) -> CommunityState {
        let mut preview = self.clone();
        if let Some(data) = &self.events {
            for event in &data.events {
                if let Err(e) = preview.apply_event(event) {
                    debug!(
                        community_id = %self.id_string(),
                        event_type_id = %event.event_type_id(),
                        error = %e,
                        "pending event does not apply to preview"
                    );
                }
            }
        }
        preview
    }

    /// Gate, then either mutate directly (control node) or record an event
    pub(crate) fn perform(&mut self, kind: CommunityEventKind, now: u64) -> CommunityResult<CommunityChanges> {
        let control = self.authorize(kind.event_type())?;
        let event = CommunityEvent::new(self.next_event_clock(now), kind)?;
        event.validate()?;

        if control {
            let origin = self.description.clone();
            self.apply_event(&event)?;
            self.increase_clock(now);
            return Ok(diff_descriptions(&origin, &self.description));
        }

        let before = self.preview();
        let mut after = before.clone();
        after.apply_event(&event)?;
        self.add_new_event(event)?;
        Ok(evaluate_changes(&before, &after))
    }

    /// Re-sign the description on the control node
    pub(crate) fn refresh_description_message(&mut self) -> CommunityResult<()> {
        if !self.is_control_node() {
            return Ok(());
        }
        if let Some(key) = &self.private_key {
            self.description_message = wrap_description(&self.description, key)?;
        }
        Ok(())
    }
}

/// Diff two snapshots of the same community, including control node moves
pub fn evaluate_changes(origin: &CommunityState, modified: &CommunityState) -> CommunityChanges {
    let mut changes = diff_descriptions(&origin.description, &modified.description);
    changes.community_id = modified.id_string();
    if origin.control_node != modified.control_node {
        changes.control_node_changed = Some(modified.control_node);
    }
    changes
}
