//! Event batch pipeline: validate base, filter, merge, dedupe, sort, apply

use super::message::CommunityEventsMessage;
use super::types::CommunityEvent;
use crate::community::{CommunityState, EventsData};
use crate::description::validate_events_base;
use crate::errors::{CommunityError, CommunityResult};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Outcome of a processed batch
#[derive(Debug, Clone, Default)]
pub struct ProcessedEvents {
    /// Events replayed, in replay order
    pub applied: Vec<CommunityEvent>,
    /// Events dropped by validation or deduplication
    pub dropped: usize,
}

pub struct EventsProcessor<'a> {
    state: &'a mut CommunityState,
    message: &'a CommunityEventsMessage,
    now: u64,
    last_applied: Option<BTreeMap<String, u64>>,
    events_to_apply: Vec<CommunityEvent>,
    dropped: usize,
}

impl<'a> EventsProcessor<'a> {
    pub fn new(state: &'a mut CommunityState, message: &'a CommunityEventsMessage, now: u64) -> Self {
        let last_applied = state
            .is_control_node()
            .then(|| state.last_applied_events.clone());

        Self {
            state,
            message,
            now,
            last_applied,
            events_to_apply: Vec::new(),
            dropped: 0,
        }
    }

    pub fn exec(mut self) -> CommunityResult<ProcessedEvents> {
        self.validate_base()?;
        self.filter_events();
        self.merge_pending_events();
        self.retain_newest_events();
        self.sort_events();
        Ok(self.apply_events())
    }

    fn validate_base(&self) -> CommunityResult<()> {
        let base = validate_events_base(&self.message.events_base_description, &self.state.control_node)?;
        let current = self.state.description.clock;

        if base.clock == current {
            return Ok(());
        }
        // The control node may already have moved past the base.
        if self.state.is_control_node() && base.clock < current {
            return Ok(());
        }

        warn!(
            community_id = %self.state.id_string(),
            base_clock = base.clock,
            clock = current,
            "events base clock does not match"
        );
        Err(CommunityError::InvalidCommunityEventClock)
    }

    fn filter_events(&mut self) {
        for event in &self.message.events {
            match self.state.validate_event(event, self.last_applied.as_ref()) {
                Ok(()) => self.events_to_apply.push(event.clone()),
                Err(e) => {
                    warn!(
                        community_id = %self.state.id_string(),
                        event_type_id = %event.event_type_id(),
                        clock = event.clock,
                        error = %e,
                        "dropping community event"
                    );
                    metrics::counter!("communities_events_dropped_total", "reason" => "invalid")
                        .increment(1);
                    self.dropped += 1;
                }
            }
        }
    }

    fn merge_pending_events(&mut self) {
        let stored = match &self.state.events {
            Some(data) => data.events.clone(),
            None => return,
        };

        for event in stored {
            match self.state.validate_event(&event, self.last_applied.as_ref()) {
                Ok(()) => self.events_to_apply.push(event),
                Err(e) => {
                    error!(
                        community_id = %self.state.id_string(),
                        event_type_id = %event.event_type_id(),
                        clock = event.clock,
                        error = %e,
                        "invalid stored community event"
                    );
                    metrics::counter!("communities_events_dropped_total", "reason" => "stale_pending")
                        .increment(1);
                }
            }
        }
    }

    /// Keep one event per target: the highest clock, ties broken by
    /// signature bytes so every replica picks the same one.
    fn retain_newest_events(&mut self) {
        let mut newest: BTreeMap<String, CommunityEvent> = BTreeMap::new();
        let total = self.events_to_apply.len();

        for event in self.events_to_apply.drain(..) {
            let id = event.event_type_id();
            let replace = match newest.get(&id) {
                Some(existing) => {
                    (event.clock, &event.signature) > (existing.clock, &existing.signature)
                }
                None => true,
            };
            if replace {
                newest.insert(id, event);
            }
        }

        self.events_to_apply = newest.into_values().collect();
        self.dropped += total - self.events_to_apply.len();
    }

    fn sort_events(&mut self) {
        self.events_to_apply.sort_by(|a, b| {
            (a.clock, a.event_type(), a.event_type_id()).cmp(&(b.clock, b.event_type(), b.event_type_id()))
        });
    }

    fn apply_events(self) -> ProcessedEvents {
        let EventsProcessor {
            state,
            message,
            now,
            last_applied,
            events_to_apply,
            dropped,
        } = self;

        if !state.is_control_node() {
            for event in &events_to_apply {
                state.record_pending_request_decision(event);
            }

            let base = match &state.events {
                Some(data) if !data.events_base_description.is_empty() => {
                    data.events_base_description.clone()
                }
                _ => message.events_base_description.clone(),
            };
            state.events = Some(EventsData {
                events_base_description: base,
                events: events_to_apply.clone(),
            });

            debug!(
                community_id = %state.id_string(),
                pending = events_to_apply.len(),
                "stored community events"
            );
            return ProcessedEvents {
                applied: events_to_apply,
                dropped,
            };
        }

        let mut last_applied = last_applied.unwrap_or_default();
        let mut applied = Vec::with_capacity(events_to_apply.len());

        for event in events_to_apply {
            match state.apply_event(&event) {
                Ok(()) => {
                    last_applied.insert(event.event_type_id(), event.clock);
                    metrics::counter!("communities_events_applied_total").increment(1);
                    applied.push(event);
                }
                Err(e) => {
                    warn!(
                        community_id = %state.id_string(),
                        event_type_id = %event.event_type_id(),
                        clock = event.clock,
                        error = %e,
                        "failed to apply community event"
                    );
                    metrics::counter!("communities_events_dropped_total", "reason" => "apply_failed")
                        .increment(1);
                }
            }
        }

        state.last_applied_events = last_applied;
        state.events = None;
        state.increase_clock(now);

        ProcessedEvents { applied, dropped }
    }
}
