//! Event sourcing for privileged members that are not the control node
//!
//! A privileged member proposes mutations as signed [`CommunityEvent`]s.
//! Every receiver runs the same pipeline over a batch:
//!
//! - validate the base description the events were built on
//! - drop invalid, unauthorized or outdated events
//! - merge with the locally stored pending events
//! - keep the newest event per logical target
//! - order by clock, then by event type
//! - replay
//!
//! Only the control node's replay has a lasting effect.

mod message;
mod processor;
mod types;

pub use message::{CommunityEventsMessage, SignedCommunityEvent};
pub use processor::{EventsProcessor, ProcessedEvents};
pub use types::{CategoryData, CommunityEditData, CommunityEvent, CommunityEventKind, EventType};
