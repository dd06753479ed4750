//! Error types shared by every community operation

use crate::crypto::CryptoError;
use crate::description::ValidationError;
use crate::manager::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("Not authorized to perform this action")]
    NotAuthorized,

    #[error("Not the control node of this community")]
    NotControlNode,

    #[error("Community not found")]
    CommunityNotFound,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Token permission not found")]
    TokenPermissionNotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Chat already exists")]
    ChatAlreadyExists,

    #[error("Category already exists")]
    CategoryAlreadyExists,

    #[error("Chat is already assigned to a category")]
    ChatAlreadyAssigned,

    #[error("No change in position")]
    NoChangeInPosition,

    #[error("Cannot remove an owner, token master or admin")]
    CannotRemoveOwnerOrAdmin,

    #[error("Cannot ban an owner, token master or admin")]
    CannotBanOwnerOrAdmin,

    #[error("Invalid community description: {0}")]
    InvalidDescription(#[from] ValidationError),

    #[error("Invalid community event: {0}")]
    InvalidEvent(String),

    #[error("Invalid grant")]
    InvalidGrant,

    #[error("Clock for community events message is outdated")]
    InvalidCommunityEventClock,

    #[error("Can't request access")]
    CantRequestAccess,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Revealed accounts do not satisfy the permissions to join")]
    NoPermissionToJoin,

    #[error("Request to join not found")]
    RequestToJoinNotFound,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<bincode::Error> for CommunityError {
    fn from(e: bincode::Error) -> Self {
        CommunityError::Serialization(e.to_string())
    }
}

pub type CommunityResult<T> = Result<T, CommunityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CommunityError::NotAuthorized.to_string(),
            "Not authorized to perform this action"
        );
        let err: CommunityError = ValidationError::MissingPermissions.into();
        assert!(err.to_string().starts_with("Invalid community description"));
    }

    #[test]
    fn test_crypto_error_conversion() {
        let err: CommunityError = CryptoError::InvalidPrivateKey.into();
        assert!(matches!(err, CommunityError::Crypto(CryptoError::InvalidPrivateKey)));
    }
}
