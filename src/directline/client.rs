//! Direct Line protocol client.
//!
//! [`DirectLineClient`] owns the bot secret, the active conversation id and
//! the polling watermark. Each network operation builds a request, runs it
//! through the [`Transport`], classifies the reply and emits the resulting
//! [`BotEvent`] through the client's [`EventDispatcher`].
//!
//! Argument and readiness failures are returned synchronously and never
//! reach the network. Everything that happens after the request is sent is
//! reported as an event.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::activity::{to_wire_format, Activity};
use super::classifier::classify;
use super::events::{BotEvent, EventDispatcher, SubscriptionId};
use super::transport::{DirectLineRequest, HttpMethod, Transport};
use super::{require_non_empty, DirectLineError, DIRECTLINE_CHANNEL_ID};

const CONVERSATIONS_PATH: &str = "conversations";
const ACTIVITIES_SEGMENT: &str = "activities";
const WATERMARK_PARAM: &str = "watermark";
const JSON_MEDIA_TYPE: &str = "application/json";
const JSON_UTF8_MEDIA_TYPE: &str = "application/json; charset=utf-8";

/// Mutable client state. Only the client's own operations write it.
#[derive(Default)]
struct ClientState {
    secret: Option<String>,
    conversation_id: Option<String>,
    watermark: Option<String>,
}

/// Client for a single Direct Line conversation.
///
/// Share it behind an `Arc`; all methods take `&self`. Network operations
/// on one client are serialized, so concurrent callers cannot interleave
/// their requests within a conversation.
pub struct DirectLineClient {
    transport: Arc<dyn Transport>,
    dispatcher: EventDispatcher,
    channel_id: String,
    state: RwLock<ClientState>,
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for DirectLineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectLineClient")
            .field("channel_id", &self.channel_id)
            .field("initialized", &self.is_initialized())
            .field("conversation_id", &self.conversation_id())
            .field("watermark", &self.watermark())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl DirectLineClient {
    /// Create an uninitialized client on top of `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            dispatcher: EventDispatcher::new(),
            channel_id: DIRECTLINE_CHANNEL_ID.to_owned(),
            state: RwLock::new(ClientState::default()),
            in_flight: Mutex::new(()),
        }
    }

    /// Override the channel id stamped on outgoing activities.
    #[must_use]
    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Set the bot secret and mark the client ready.
    ///
    /// Calling it again replaces the secret.
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::InvalidArgument`] if `secret` is empty.
    pub fn initialize(&self, secret: &str) -> Result<(), DirectLineError> {
        require_non_empty("secret", secret)?;
        if let Ok(mut state) = self.state.write() {
            state.secret = Some(secret.to_owned());
        }
        info!("direct line client initialized");
        Ok(())
    }

    /// Whether a secret has been set.
    pub fn is_initialized(&self) -> bool {
        self.state
            .read()
            .map(|state| state.secret.is_some())
            .unwrap_or(false)
    }

    /// The conversation opened by the last successful
    /// [`start_conversation`](Self::start_conversation).
    pub fn conversation_id(&self) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.conversation_id.clone())
    }

    /// The watermark returned by the last fetch on the active conversation.
    pub fn watermark(&self) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.watermark.clone())
    }

    /// The dispatcher events are emitted through.
    pub fn events(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Register an event handler. See [`EventDispatcher::subscribe`].
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BotEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(handler)
    }

    /// Remove an event handler. See [`EventDispatcher::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Open a new conversation with the bot.
    ///
    /// On [`BotEvent::ConversationStarted`] the new id becomes the active
    /// conversation and the stored watermark is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::NotInitialized`] before [`initialize`](Self::initialize).
    pub async fn start_conversation(&self) -> Result<Option<BotEvent>, DirectLineError> {
        let secret = self.require_secret("start_conversation")?;
        let request = self.build_request(HttpMethod::Post, CONVERSATIONS_PATH.to_owned(), &secret);
        Ok(self.dispatch(request, None).await)
    }

    /// Post a message activity to `conversation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::InvalidArgument`] if `conversation_id`,
    /// `sender_id` or `text` is empty, [`DirectLineError::NotInitialized`]
    /// before [`initialize`](Self::initialize), and
    /// [`DirectLineError::Encode`] if the activity cannot be serialized.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        sender_name: Option<&str>,
    ) -> Result<Option<BotEvent>, DirectLineError> {
        require_non_empty("conversation id", conversation_id)?;
        let mut activity = Activity::message(sender_id, text, self.channel_id.as_str())?;
        if let Some(name) = sender_name {
            activity = activity.with_sender_name(name);
        }
        let secret = self.require_secret("send_message")?;

        debug!(conversation_id, sender_id, "sending message");
        let mut request =
            self.build_request(HttpMethod::Post, activities_path(conversation_id), &secret);
        request
            .headers
            .push(("content-type".to_owned(), JSON_UTF8_MEDIA_TYPE.to_owned()));
        request.body = Some(to_wire_format(&activity)?);

        Ok(self.dispatch(request, Some(conversation_id)).await)
    }

    /// Fetch activities of `conversation_id` newer than `watermark`.
    ///
    /// When `conversation_id` is the active conversation, the watermark of a
    /// [`BotEvent::MessageReceived`] reply is stored for
    /// [`fetch_new_messages`](Self::fetch_new_messages).
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::InvalidArgument`] if `conversation_id` is
    /// empty and [`DirectLineError::NotInitialized`] before
    /// [`initialize`](Self::initialize).
    pub async fn fetch_messages(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<Option<BotEvent>, DirectLineError> {
        require_non_empty("conversation id", conversation_id)?;
        let secret = self.require_secret("fetch_messages")?;

        let mut request =
            self.build_request(HttpMethod::Get, activities_path(conversation_id), &secret);
        if let Some(watermark) = watermark.filter(|w| !w.is_empty()) {
            request
                .query
                .push((WATERMARK_PARAM.to_owned(), watermark.to_owned()));
        }

        Ok(self.dispatch(request, Some(conversation_id)).await)
    }

    /// Fetch activities of the active conversation since the stored watermark.
    ///
    /// # Errors
    ///
    /// Returns [`DirectLineError::InvalidArgument`] when no conversation has
    /// been started, plus the errors of [`fetch_messages`](Self::fetch_messages).
    pub async fn fetch_new_messages(&self) -> Result<Option<BotEvent>, DirectLineError> {
        let conversation_id = self.conversation_id().ok_or_else(|| {
            DirectLineError::InvalidArgument("no active conversation".to_owned())
        })?;
        let watermark = self.watermark();
        self.fetch_messages(&conversation_id, watermark.as_deref())
            .await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_secret(&self, operation: &str) -> Result<String, DirectLineError> {
        let secret = self
            .state
            .read()
            .ok()
            .and_then(|state| state.secret.clone());
        secret.ok_or_else(|| {
            warn!(operation, "direct line client is not initialized, skipping");
            DirectLineError::NotInitialized
        })
    }

    fn build_request(&self, method: HttpMethod, path: String, secret: &str) -> DirectLineRequest {
        DirectLineRequest {
            method,
            path,
            query: Vec::new(),
            headers: vec![
                ("authorization".to_owned(), format!("Bearer {secret}")),
                ("accept".to_owned(), JSON_MEDIA_TYPE.to_owned()),
            ],
            body: None,
        }
    }

    /// Run `request`, classify the reply, record state and emit the event.
    async fn dispatch(
        &self,
        request: DirectLineRequest,
        conversation_id: Option<&str>,
    ) -> Option<BotEvent> {
        let _in_flight = self.in_flight.lock().await;
        let method = request.method;
        let path = request.path.clone();

        let event = match self.transport.execute(request).await {
            Err(e) => {
                warn!(?method, path = %path, error = %e, "direct line request failed");
                Some(BotEvent::TransportError {
                    status: e.status(),
                    message: e.to_string(),
                })
            }
            Ok(body) if body.is_empty() => {
                debug!(?method, path = %path, "received an empty response");
                None
            }
            Ok(body) => {
                debug!(?method, path = %path, bytes = body.len(), "received response");
                match classify(&body) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(path = %path, error = %e, "could not classify response");
                        Some(BotEvent::MalformedResponse {
                            detail: e.to_string(),
                        })
                    }
                }
            }
        };

        let event = event?;
        self.record(&event, conversation_id);
        info!(kind = event.kind(), path = %path, "direct line event");
        self.dispatcher.emit(&event);
        Some(event)
    }

    fn record(&self, event: &BotEvent, conversation_id: Option<&str>) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        match event {
            BotEvent::ConversationStarted { conversation_id }
                if !conversation_id.trim().is_empty() =>
            {
                state.conversation_id = Some(conversation_id.clone());
                state.watermark = None;
            }
            BotEvent::MessageReceived {
                watermark: Some(watermark),
                ..
            } => {
                let is_active = conversation_id.is_some()
                    && state.conversation_id.as_deref() == conversation_id;
                if is_active {
                    state.watermark = Some(watermark.clone());
                }
            }
            _ => {}
        }
    }
}

fn activities_path(conversation_id: &str) -> String {
    format!("{CONVERSATIONS_PATH}/{conversation_id}/{ACTIVITIES_SEGMENT}")
}
