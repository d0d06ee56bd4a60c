//! Activity model and its Direct Line wire encoding.
//!
//! On the wire an activity looks like:
//!
//! ```json
//! {"type":"message","from":{"id":"user-1","name":"Ada"},"text":"hi","channelId":"directline"}
//! ```
//!
//! Optional attributes (`id`, `from.name`, `conversation`) are omitted when
//! absent so that encoding is deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{require_non_empty, DirectLineError};

const MESSAGE_ACTIVITY_TYPE: &str = "message";

/// A single message exchanged within a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Identifier of the sender (`from.id`).
    pub sender_id: String,
    /// Message text.
    pub text: String,
    /// Channel the activity travels on (`channelId`).
    pub channel_id: String,
    /// Conversation the activity belongs to (`conversation.id`).
    pub conversation_id: Option<String>,
    /// Display name of the sender (`from.name`).
    pub sender_name: Option<String>,
    /// Server-assigned activity identifier.
    pub id: Option<String>,
}

impl Activity {
    /// Build an outgoing message activity.
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::InvalidArgument`] when `sender_id` or `text`
    /// is empty.
    pub fn message(
        sender_id: impl Into<String>,
        text: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Result<Self, DirectLineError> {
        let sender_id = sender_id.into();
        let text = text.into();
        require_non_empty("sender id", &sender_id)?;
        require_non_empty("message text", &text)?;
        Ok(Self {
            sender_id,
            text,
            channel_id: channel_id.into(),
            conversation_id: None,
            sender_name: None,
            id: None,
        })
    }

    /// Attach a sender display name.
    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Attach the owning conversation identifier.
    #[must_use]
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Whether this activity was authored by `sender_id`.
    pub fn is_from(&self, sender_id: &str) -> bool {
        self.sender_id == sender_id
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireActivity {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    from: WireAccount,
    text: String,
    channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conversation: Option<WireConversation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAccount {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireConversation {
    id: String,
}

impl From<&Activity> for WireActivity {
    fn from(activity: &Activity) -> Self {
        Self {
            kind: Some(MESSAGE_ACTIVITY_TYPE.to_owned()),
            id: activity.id.clone(),
            from: WireAccount {
                id: activity.sender_id.clone(),
                name: activity.sender_name.clone(),
            },
            text: activity.text.clone(),
            channel_id: activity.channel_id.clone(),
            conversation: activity
                .conversation_id
                .clone()
                .map(|id| WireConversation { id }),
        }
    }
}

impl From<WireActivity> for Activity {
    fn from(wire: WireActivity) -> Self {
        Self {
            sender_id: wire.from.id,
            text: wire.text,
            channel_id: wire.channel_id,
            conversation_id: wire.conversation.map(|c| c.id),
            sender_name: wire.from.name,
            id: wire.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an activity as a UTF-8 JSON document.
///
/// # Errors
///
/// Returns [`DirectLineError::Encode`] if serialization fails.
pub fn to_wire_format(activity: &Activity) -> Result<Vec<u8>, DirectLineError> {
    Ok(serde_json::to_vec(&WireActivity::from(activity))?)
}

/// Decode an activity from a parsed JSON node.
///
/// # Errors
///
/// Returns [`DirectLineError::MalformedResponse`] when `from.id`, `text` or
/// `channelId` is missing or has the wrong type.
pub fn from_wire_format(node: &Value) -> Result<Activity, DirectLineError> {
    let wire = WireActivity::deserialize(node)
        .map_err(|e| DirectLineError::MalformedResponse(format!("invalid activity: {e}")))?;
    Ok(wire.into())
}
