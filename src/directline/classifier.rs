//! Response classification.
//!
//! Every successful Direct Line reply is one of four shapes. They overlap
//! (an error envelope may also carry a conversation id), so the checks run
//! in a fixed priority order and the first match wins:
//!
//! 1. `error` → [`BotEvent::Error`]
//! 2. `conversationId` → [`BotEvent::ConversationStarted`]
//! 3. `id` → [`BotEvent::MessageSent`]
//! 4. `activities` → [`BotEvent::MessageReceived`]
//!
//! Anything else is a protocol mismatch and classifies to nothing. A matched
//! `conversationId` or `id` must be a non-blank string.

use serde_json::{Map, Value};
use tracing::warn;

use super::activity::from_wire_format;
use super::{BotEvent, DirectLineError};

const KEY_ERROR: &str = "error";
const KEY_CODE: &str = "code";
const KEY_MESSAGE: &str = "message";
const KEY_CONVERSATION_ID: &str = "conversationId";
const KEY_ID: &str = "id";
const KEY_ACTIVITIES: &str = "activities";
const KEY_WATERMARK: &str = "watermark";

/// Map a raw response body to the event it represents.
///
/// Returns `Ok(None)` when the body parses but matches no known shape.
///
/// # Errors
///
/// Returns [`DirectLineError::InvalidArgument`] for an empty body and
/// [`DirectLineError::MalformedResponse`] when the body is not a JSON object
/// or any fetched activity fails to decode.
pub fn classify(body: &str) -> Result<Option<BotEvent>, DirectLineError> {
    if body.is_empty() {
        return Err(DirectLineError::InvalidArgument(
            "response body cannot be empty".to_owned(),
        ));
    }

    let root: Value = serde_json::from_str(body)
        .map_err(|e| DirectLineError::MalformedResponse(format!("invalid JSON: {e}")))?;
    let root = root.as_object().ok_or_else(|| {
        DirectLineError::MalformedResponse("response is not a JSON object".to_owned())
    })?;

    if let Some(error) = field(root, KEY_ERROR) {
        let code = error
            .get(KEY_CODE)
            .and_then(scalar_to_string)
            .unwrap_or_default();
        let message = error
            .get(KEY_MESSAGE)
            .and_then(scalar_to_string)
            .filter(|m| !m.is_empty());
        return Ok(Some(BotEvent::Error { code, message }));
    }

    if let Some(conversation_id) = field(root, KEY_CONVERSATION_ID) {
        return Ok(Some(BotEvent::ConversationStarted {
            conversation_id: identifier(KEY_CONVERSATION_ID, conversation_id)?,
        }));
    }

    if let Some(id) = field(root, KEY_ID) {
        return Ok(Some(BotEvent::MessageSent {
            sent_message_id: identifier(KEY_ID, id)?,
        }));
    }

    if let Some(activities) = field(root, KEY_ACTIVITIES) {
        let nodes = activities.as_array().ok_or_else(|| {
            DirectLineError::MalformedResponse("`activities` is not an array".to_owned())
        })?;
        let activities = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                from_wire_format(node).map_err(|e| {
                    DirectLineError::MalformedResponse(format!("activity #{index}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let watermark = field(root, KEY_WATERMARK).and_then(scalar_to_string);
        return Ok(Some(BotEvent::MessageReceived {
            watermark,
            activities,
        }));
    }

    warn!(
        keys = ?root.keys().collect::<Vec<_>>(),
        "response matches no known Direct Line shape"
    );
    Ok(None)
}

/// A present, non-null field.
fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

/// A service-assigned identifier: a string with something besides whitespace.
fn identifier(key: &str, value: &Value) -> Result<String, DirectLineError> {
    match value.as_str() {
        Some(id) if !id.trim().is_empty() => Ok(id.to_owned()),
        Some(_) => Err(DirectLineError::MalformedResponse(format!(
            "`{key}` is blank"
        ))),
        None => Err(DirectLineError::MalformedResponse(format!(
            "`{key}` is not a string"
        ))),
    }
}

/// Render strings as-is and other scalars in their JSON form.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
