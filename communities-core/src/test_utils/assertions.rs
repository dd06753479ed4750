//! Custom assertions for community tests
//!
//! Failures print the structural diff instead of two full descriptions.

use crate::changes::diff_descriptions;
use crate::community::Community;
use crate::description::CommunityDescription;

/// Assert two descriptions are identical, ignoring nothing
pub fn assert_descriptions_converged(left: &CommunityDescription, right: &CommunityDescription) {
    if left != right {
        let changes = diff_descriptions(left, right);
        panic!(
            "descriptions diverged (clock {} vs {}): {:#?}",
            left.clock, right.clock, changes
        );
    }
}

/// Assert the pending-event preview of `member` matches `control`
pub fn assert_preview_matches(member: &Community, control: &Community) {
    let preview = member.preview_description();
    let authoritative = control.description();
    let changes = diff_descriptions(&preview, &authoritative);
    assert!(
        changes.members_added.is_empty()
            && changes.members_removed.is_empty()
            && changes.chats_added.is_empty()
            && changes.chats_removed.is_empty()
            && changes.categories_added.is_empty()
            && changes.categories_removed.is_empty()
            && changes.token_permissions_added.is_empty()
            && changes.token_permissions_removed.is_empty(),
        "preview differs from control node state: {:#?}",
        changes
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converged_descriptions_pass() {
        let d = CommunityDescription::default();
        assert_descriptions_converged(&d, &d.clone());
    }

    #[test]
    #[should_panic(expected = "descriptions diverged")]
    fn test_diverged_descriptions_panic() {
        let mut other = CommunityDescription::default();
        other.clock = 2;
        assert_descriptions_converged(&CommunityDescription::default(), &other);
    }
}
