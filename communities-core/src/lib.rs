//! Replicated state core for decentralized communities
//!
//! A community is a signed [`CommunityDescription`] owned by one control
//! node. The control node mutates it directly and advances its Lamport
//! clock; privileged members propose changes as signed events which the
//! control node folds back in. Token-gated permissions decide who may
//! join, hold a role or see a channel.

pub mod changes;
pub mod community;
pub mod config;
pub mod crypto;
pub mod description;
pub mod encryption;
pub mod errors;
pub mod events;
pub mod logging;
pub mod manager;
pub mod permissions;
pub mod roles;
pub mod test_utils;

pub use changes::CommunityChanges;
pub use community::{Community, CommunityConfig, CommunityState};
pub use config::Config;
pub use description::CommunityDescription;
pub use errors::{CommunityError, CommunityResult};
pub use logging::{init_logging, LogLevel};
pub use manager::{CommunityManager, Subscription};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
        assert!(CommunityChanges::empty("0x01").is_empty());
    }
}
