//! Direct Line v3 conversation protocol.
//!
//! The protocol is poll-based: a conversation is opened with
//! `POST conversations`, user activities are posted to
//! `conversations/{id}/activities`, and bot activities are fetched from the
//! same path with an optional `watermark` cursor.
//!
//! Layers, leaf first:
//! - [`activity`] - the [`Activity`] model and its wire encoding
//! - [`classifier`] - maps a raw response body to a [`BotEvent`]
//! - [`events`] - the [`EventDispatcher`] subscribers register with
//! - [`transport`] - the [`Transport`] seam and its reqwest implementation
//! - [`client`] - the [`DirectLineClient`] that ties them together

pub mod activity;
pub mod classifier;
pub mod client;
pub mod events;
pub mod transport;

pub use activity::Activity;
pub use classifier::classify;
pub use client::DirectLineClient;
pub use events::{BotEvent, EventDispatcher, SubscriptionId};
pub use transport::{DirectLineRequest, HttpMethod, ReqwestTransport, Transport, TransportError};

/// Default Direct Line v3 endpoint prefix.
pub const DEFAULT_BASE_URL: &str = "https://directline.botframework.com/v3/directline/";

/// Channel identifier attached to activities posted by this client.
pub const DIRECTLINE_CHANNEL_ID: &str = "directline";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned synchronously by Direct Line operations.
///
/// Only argument and readiness failures stop an operation before it reaches
/// the network. Server error envelopes, transport failures and malformed
/// bodies are delivered as [`BotEvent`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum DirectLineError {
    /// A required string parameter was empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The client has no secret yet.
    #[error("direct line client is not initialized")]
    NotInitialized,
    /// The response body did not match any known protocol shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// An activity could not be encoded for the wire.
    #[error("failed to encode activity: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fail with [`DirectLineError::InvalidArgument`] when `value` is empty.
pub(crate) fn require_non_empty(name: &str, value: &str) -> Result<(), DirectLineError> {
    if value.is_empty() {
        return Err(DirectLineError::InvalidArgument(format!(
            "{name} cannot be empty"
        )));
    }
    Ok(())
}
