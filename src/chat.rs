//! Console chat session on top of [`DirectLineClient`].
//!
//! Reacts to the outcome of each client call the way an interactive front-end
//! does: a started conversation is remembered, an accepted message triggers a
//! fetch, and fetched activities from anyone but the local user are handed
//! back as replies.
//!
//! Each step reads the event its own client call returned, never the shared
//! dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::UserConfig;
use crate::directline::{Activity, BotEvent, DirectLineClient, DirectLineError};

/// Failures surfaced to the chat front-end.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The client rejected the call before reaching the network.
    #[error(transparent)]
    Client(#[from] DirectLineError),
    /// The service answered with an error envelope.
    #[error("bot service error {code}: {}", .message.as_deref().unwrap_or("no details"))]
    Service {
        /// Service error code.
        code: String,
        /// Optional detail.
        message: Option<String>,
    },
    /// The HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The reply could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// No event was produced (empty or unrecognized reply).
    #[error("no response from bot service")]
    NoResponse,
    /// The service returned an empty conversation id.
    #[error("bot service returned an empty conversation id")]
    EmptyConversation,
    /// An event arrived that does not fit the current step.
    #[error("unexpected {0} event")]
    Unexpected(&'static str),
}

/// One user turn: the activities the bot produced in response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Id the service assigned to the user's message.
    pub sent_message_id: String,
    /// Activities not authored by the local user, in server order.
    pub replies: Vec<Activity>,
}

/// An open conversation driven line by line.
pub struct ChatSession {
    client: Arc<DirectLineClient>,
    user: UserConfig,
    fetch_delay: Duration,
    conversation_id: String,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation_id", &self.conversation_id)
            .field("user", &self.user.id)
            .finish()
    }
}

impl ChatSession {
    /// Start a conversation for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] when the conversation could not be started.
    pub async fn open(
        client: Arc<DirectLineClient>,
        user: UserConfig,
        fetch_delay: Duration,
    ) -> Result<Self, ChatError> {
        let conversation_id = match outcome(client.start_conversation().await?)? {
            BotEvent::ConversationStarted { conversation_id } => conversation_id,
            other => return Err(unexpected(other)),
        };
        if conversation_id.trim().is_empty() {
            return Err(ChatError::EmptyConversation);
        }
        info!(conversation_id = %conversation_id, "bot connection established");

        Ok(Self {
            client,
            user,
            fetch_delay,
            conversation_id,
        })
    }

    /// The conversation this session talks in.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Send `text` and collect the bot's replies.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] if sending or the follow-up fetch fails.
    pub async fn say(&mut self, text: &str) -> Result<ChatTurn, ChatError> {
        let sent = self
            .client
            .send_message(
                &self.conversation_id,
                &self.user.id,
                text,
                self.user.name.as_deref(),
            )
            .await?;
        let sent_message_id = match outcome(sent)? {
            BotEvent::MessageSent { sent_message_id } => sent_message_id,
            other => return Err(unexpected(other)),
        };
        debug!(sent_message_id = %sent_message_id, "message accepted");

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let replies = self.poll().await?;

        Ok(ChatTurn {
            sent_message_id,
            replies,
        })
    }

    /// Fetch activities since the last poll, excluding the user's own.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] if the fetch fails.
    pub async fn poll(&mut self) -> Result<Vec<Activity>, ChatError> {
        let fetched = self
            .client
            .fetch_messages(&self.conversation_id, self.client.watermark().as_deref())
            .await?;
        match outcome(fetched)? {
            BotEvent::MessageReceived { activities, .. } => Ok(activities
                .into_iter()
                .filter(|a| !a.is_from(&self.user.id))
                .collect()),
            other => Err(unexpected(other)),
        }
    }
}

/// Turn an operation's event into the next step, or the error it reports.
fn outcome(event: Option<BotEvent>) -> Result<BotEvent, ChatError> {
    match event.ok_or(ChatError::NoResponse)? {
        BotEvent::Error { code, message } => Err(ChatError::Service { code, message }),
        BotEvent::TransportError { message, .. } => Err(ChatError::Transport(message)),
        BotEvent::MalformedResponse { detail } => Err(ChatError::Malformed(detail)),
        other => Ok(other),
    }
}

fn unexpected(event: BotEvent) -> ChatError {
    ChatError::Unexpected(event.kind())
}
