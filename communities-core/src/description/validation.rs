//! Schema validation for community descriptions

use super::types::{AccessType, CommunityChat, CommunityDescription, TokenPermissionType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing community permissions")]
    MissingPermissions,

    #[error("unknown community access type")]
    UnknownAccessType,

    #[error("missing permissions for chat {0}")]
    MissingChatPermissions(String),

    #[error("unknown access type for chat {0}")]
    UnknownChatAccess(String),

    #[error("category {category_id} of chat {chat} not found")]
    ChatCategoryNotFound { chat: String, category_id: String },

    #[error("member {member} of chat {chat} is not a community member")]
    ChatMemberNotInCommunity { chat: String, member: String },

    #[error("duplicated chat name {0}")]
    DuplicatedChatName(String),

    #[error("invalid token permission {id}: {reason}")]
    InvalidTokenPermission { id: String, reason: String },
}

pub fn validate_description(description: &CommunityDescription) -> Result<(), ValidationError> {
    let permissions = description
        .permissions
        .as_ref()
        .ok_or(ValidationError::MissingPermissions)?;

    if permissions.access == AccessType::Unknown {
        return Err(ValidationError::UnknownAccessType);
    }

    for (id, chat) in &description.chats {
        validate_chat(description, id, chat)?;
    }

    for (key, permission) in &description.token_permissions {
        let invalid = |reason: &str| ValidationError::InvalidTokenPermission {
            id: key.clone(),
            reason: reason.to_string(),
        };
        if permission.id.is_empty() || &permission.id != key {
            return Err(invalid("id does not match its key"));
        }
        if permission.permission_type == TokenPermissionType::Unknown {
            return Err(invalid("unknown permission type"));
        }
    }

    Ok(())
}

/// Validate a single chat against the description it lives in
pub fn validate_chat(
    description: &CommunityDescription,
    chat_id: &str,
    chat: &CommunityChat,
) -> Result<(), ValidationError> {
    let permissions = chat
        .permissions
        .as_ref()
        .ok_or_else(|| ValidationError::MissingChatPermissions(chat_id.to_string()))?;

    if permissions.access == AccessType::Unknown {
        return Err(ValidationError::UnknownChatAccess(chat_id.to_string()));
    }

    if !chat.category_id.is_empty() && !description.categories.contains_key(&chat.category_id) {
        return Err(ValidationError::ChatCategoryNotFound {
            chat: chat_id.to_string(),
            category_id: chat.category_id.clone(),
        });
    }

    if let Some(member) = chat.members.keys().find(|k| !description.has_member(k)) {
        return Err(ValidationError::ChatMemberNotInCommunity {
            chat: chat_id.to_string(),
            member: member.clone(),
        });
    }

    Ok(())
}
