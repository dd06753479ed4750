//! Community event types

use crate::community::RequestToJoin;
use crate::crypto::{recover_signer, sign, PrivateKey, PublicKey};
use crate::description::{
    CommunityAdminSettings, CommunityChat, CommunityIdentity, CommunityPermissions,
    CommunityTokenMetadata, MemberKey, TokenPermission,
};
use crate::errors::{CommunityError, CommunityResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type tag. Declaration order follows the wire values so the derived
/// ordering matches the replay tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    CommunityEdit,
    TokenPermissionChange,
    TokenPermissionDelete,
    CategoryCreate,
    CategoryDelete,
    CategoryEdit,
    ChannelCreate,
    ChannelDelete,
    ChannelEdit,
    CategoryReorder,
    ChannelReorder,
    RequestToJoinAccept,
    RequestToJoinReject,
    MemberKick,
    MemberBan,
    MemberUnban,
    TokenAdd,
    DeleteBannedMemberMessages,
}

impl EventType {
    pub fn wire_value(&self) -> u32 {
        match self {
            EventType::CommunityEdit => 1,
            EventType::TokenPermissionChange => 2,
            EventType::TokenPermissionDelete => 3,
            EventType::CategoryCreate => 4,
            EventType::CategoryDelete => 5,
            EventType::CategoryEdit => 6,
            EventType::ChannelCreate => 7,
            EventType::ChannelDelete => 8,
            EventType::ChannelEdit => 9,
            EventType::CategoryReorder => 10,
            EventType::ChannelReorder => 11,
            EventType::RequestToJoinAccept => 12,
            EventType::RequestToJoinReject => 13,
            EventType::MemberKick => 14,
            EventType::MemberBan => 15,
            EventType::MemberUnban => 16,
            EventType::TokenAdd => 17,
            EventType::DeleteBannedMemberMessages => 18,
        }
    }

    pub fn from_wire_value(value: u32) -> Option<Self> {
        let event_type = match value {
            1 => EventType::CommunityEdit,
            2 => EventType::TokenPermissionChange,
            3 => EventType::TokenPermissionDelete,
            4 => EventType::CategoryCreate,
            5 => EventType::CategoryDelete,
            6 => EventType::CategoryEdit,
            7 => EventType::ChannelCreate,
            8 => EventType::ChannelDelete,
            9 => EventType::ChannelEdit,
            10 => EventType::CategoryReorder,
            11 => EventType::ChannelReorder,
            12 => EventType::RequestToJoinAccept,
            13 => EventType::RequestToJoinReject,
            14 => EventType::MemberKick,
            15 => EventType::MemberBan,
            16 => EventType::MemberUnban,
            17 => EventType::TokenAdd,
            18 => EventType::DeleteBannedMemberMessages,
            _ => return None,
        };
        Some(event_type)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

/// Community-wide settings carried by an edit event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityEditData {
    pub identity: CommunityIdentity,
    pub permissions: CommunityPermissions,
    pub admin_settings: CommunityAdminSettings,
    pub intro_message: String,
    pub outro_message: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryData {
    pub category_id: String,
    pub name: String,
    pub channel_ids: Vec<String>,
}

/// Payload of an event, one variant per shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunityEventKind {
    CommunityEdit(CommunityEditData),
    TokenPermissionChange(TokenPermission),
    TokenPermissionDelete(TokenPermission),
    CategoryCreate(CategoryData),
    CategoryDelete { category_id: String },
    CategoryEdit(CategoryData),
    ChannelCreate { channel_id: String, channel: CommunityChat },
    ChannelDelete { channel_id: String },
    ChannelEdit { channel_id: String, channel: CommunityChat },
    CategoryReorder { category_id: String, position: i32 },
    ChannelReorder { category_id: String, channel_id: String, position: i32 },
    RequestToJoinAccept { member: MemberKey, request: RequestToJoin },
    RequestToJoinReject { member: MemberKey, request: RequestToJoin },
    MemberKick { member: MemberKey },
    MemberBan { member: MemberKey, delete_all_messages: bool },
    MemberUnban { member: MemberKey },
    TokenAdd(CommunityTokenMetadata),
    DeleteBannedMemberMessages { member: MemberKey },
}

impl CommunityEventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            CommunityEventKind::CommunityEdit(_) => EventType::CommunityEdit,
            CommunityEventKind::TokenPermissionChange(_) => EventType::TokenPermissionChange,
            CommunityEventKind::TokenPermissionDelete(_) => EventType::TokenPermissionDelete,
            CommunityEventKind::CategoryCreate(_) => EventType::CategoryCreate,
            CommunityEventKind::CategoryDelete { .. } => EventType::CategoryDelete,
            CommunityEventKind::CategoryEdit(_) => EventType::CategoryEdit,
            CommunityEventKind::ChannelCreate { .. } => EventType::ChannelCreate,
            CommunityEventKind::ChannelDelete { .. } => EventType::ChannelDelete,
            CommunityEventKind::ChannelEdit { .. } => EventType::ChannelEdit,
            CommunityEventKind::CategoryReorder { .. } => EventType::CategoryReorder,
            CommunityEventKind::ChannelReorder { .. } => EventType::ChannelReorder,
            CommunityEventKind::RequestToJoinAccept { .. } => EventType::RequestToJoinAccept,
            CommunityEventKind::RequestToJoinReject { .. } => EventType::RequestToJoinReject,
            CommunityEventKind::MemberKick { .. } => EventType::MemberKick,
            CommunityEventKind::MemberBan { .. } => EventType::MemberBan,
            CommunityEventKind::MemberUnban { .. } => EventType::MemberUnban,
            CommunityEventKind::TokenAdd(_) => EventType::TokenAdd,
            CommunityEventKind::DeleteBannedMemberMessages { .. } => {
                EventType::DeleteBannedMemberMessages
            }
        }
    }

    /// Identifier of the logical target, `None` for community-wide edits
    fn target(&self) -> Option<&str> {
        match self {
            CommunityEventKind::CommunityEdit(_) => None,
            CommunityEventKind::TokenPermissionChange(p)
            | CommunityEventKind::TokenPermissionDelete(p) => Some(&p.id),
            CommunityEventKind::CategoryCreate(c) | CommunityEventKind::CategoryEdit(c) => {
                Some(&c.category_id)
            }
            CommunityEventKind::CategoryDelete { category_id }
            | CommunityEventKind::CategoryReorder { category_id, .. } => Some(category_id),
            CommunityEventKind::ChannelCreate { channel_id, .. }
            | CommunityEventKind::ChannelDelete { channel_id }
            | CommunityEventKind::ChannelEdit { channel_id, .. }
            | CommunityEventKind::ChannelReorder { channel_id, .. } => Some(channel_id),
            CommunityEventKind::RequestToJoinAccept { member, .. }
            | CommunityEventKind::RequestToJoinReject { member, .. }
            | CommunityEventKind::MemberKick { member }
            | CommunityEventKind::MemberBan { member, .. }
            | CommunityEventKind::MemberUnban { member }
            | CommunityEventKind::DeleteBannedMemberMessages { member } => Some(member),
            CommunityEventKind::TokenAdd(metadata) => Some(&metadata.name),
        }
    }
}

/// A signed intention of a privileged member.
///
/// `payload` is the serialized `(clock, kind)` pair and is what gets signed,
/// so the signer can be recovered without trusting the outer envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityEvent {
    pub clock: u64,
    pub kind: CommunityEventKind,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CommunityEvent {
    pub fn new(clock: u64, kind: CommunityEventKind) -> CommunityResult<Self> {
        let payload = bincode::serialize(&(clock, &kind))?;
        Ok(Self {
            clock,
            kind,
            payload,
            signature: Vec::new(),
        })
    }

    /// Rebuild an event from its signed payload
    pub fn from_payload(payload: Vec<u8>, signature: Vec<u8>) -> CommunityResult<Self> {
        let (clock, kind): (u64, CommunityEventKind) = bincode::deserialize(&payload)?;
        Ok(Self {
            clock,
            kind,
            payload,
            signature,
        })
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Key of the mutation stream this event belongs to. Only the newest
    /// event per id survives deduplication.
    pub fn event_type_id(&self) -> String {
        match self.kind.target() {
            Some(target) => format!("{}-{}", self.event_type(), target),
            None => self.event_type().to_string(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    pub fn sign(&mut self, key: &PrivateKey) -> CommunityResult<()> {
        self.signature = sign(key, &self.payload)?;
        Ok(())
    }

    pub fn recover_signer(&self) -> CommunityResult<PublicKey> {
        if !self.is_signed() {
            return Err(CommunityError::InvalidEvent("event is not signed".to_string()));
        }
        Ok(recover_signer(&self.payload, &self.signature)?)
    }

    /// Member the event acts upon, if any
    pub fn member_to_action(&self) -> Option<&str> {
        match &self.kind {
            CommunityEventKind::RequestToJoinAccept { member, .. }
            | CommunityEventKind::RequestToJoinReject { member, .. }
            | CommunityEventKind::MemberKick { member }
            | CommunityEventKind::MemberBan { member, .. }
            | CommunityEventKind::MemberUnban { member }
            | CommunityEventKind::DeleteBannedMemberMessages { member } => Some(member),
            _ => None,
        }
    }

    pub fn token_permission(&self) -> Option<&TokenPermission> {
        match &self.kind {
            CommunityEventKind::TokenPermissionChange(p)
            | CommunityEventKind::TokenPermissionDelete(p) => Some(p),
            _ => None,
        }
    }

    /// Structural checks that do not depend on community state
    pub fn validate(&self) -> CommunityResult<()> {
        let invalid = |reason: &str| Err(CommunityError::InvalidEvent(reason.to_string()));

        if self.clock == 0 {
            return invalid("clock must be set");
        }

        match &self.kind {
            CommunityEventKind::CommunityEdit(data) => {
                if data.permissions.access == crate::description::AccessType::Unknown {
                    return invalid("community edit requires an access type");
                }
            }
            CommunityEventKind::TokenAdd(metadata) => {
                if metadata.contract_addresses.is_empty() {
                    return invalid("token metadata requires contract addresses");
                }
            }
            CommunityEventKind::ChannelCreate { channel, .. }
            | CommunityEventKind::ChannelEdit { channel, .. } => {
                if channel.permissions.is_none() {
                    return invalid("channel requires permissions");
                }
            }
            CommunityEventKind::RequestToJoinAccept { member, request }
            | CommunityEventKind::RequestToJoinReject { member, request } => {
                if request.public_key.is_empty() {
                    return invalid("request to join requires a member");
                }
                if *member != request.public_key {
                    return invalid("request to join belongs to another member");
                }
            }
            _ => {}
        }

        if let Some(target) = self.kind.target() {
            if target.is_empty() {
                return invalid("event target must not be empty");
            }
        }

        Ok(())
    }
}
