//! Community description model
//!
//! The description is the replicated document every node holds a copy of.
//! Only the control node signs new versions; everyone else receives them
//! wrapped in a [`SignedMessage`] envelope.

mod envelope;
mod types;
mod validation;

pub use envelope::{
    unwrap_description, validate_events_base, wrap_description, MessageType, SignedMessage,
};
pub use types::*;
pub use validation::{validate_chat, validate_description, ValidationError};
