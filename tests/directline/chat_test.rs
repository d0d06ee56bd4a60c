//! Console chat session flow over a scripted transport.

use std::time::Duration;

use directline::chat::{ChatError, ChatSession};
use directline::config::UserConfig;
use directline::directline::{BotEvent, DirectLineError, HttpMethod, TransportError};

use crate::support::{ready_client, ScriptedTransport};

fn user() -> UserConfig {
    UserConfig {
        id: "user-1".to_owned(),
        name: Some("Ada".to_owned()),
    }
}

#[tokio::test]
async fn say_sends_then_fetches_bot_replies() {
    let transport = ScriptedTransport::with_bodies(&[
        r#"{"conversationId":"c1"}"#,
        r#"{"id":"c1|0001"}"#,
        r#"{"watermark":"2","activities":[
            {"from":{"id":"user-1","name":"Ada"},"text":"hello","channelId":"directline"},
            {"from":{"id":"bot","name":"Echo"},"text":"you said hello","channelId":"directline"}
        ]}"#,
    ]);
    let client = ready_client(&transport, "s3cret");

    let mut session = match ChatSession::open(client.clone(), user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };
    assert_eq!(session.conversation_id(), "c1");

    let turn = match session.say("hello").await {
        Ok(turn) => turn,
        Err(err) => panic!("turn should succeed: {err}"),
    };
    assert_eq!(turn.sent_message_id, "c1|0001");
    assert_eq!(turn.replies.len(), 1);
    assert_eq!(turn.replies[0].text, "you said hello");
    assert_eq!(client.watermark().as_deref(), Some("2"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, HttpMethod::Post);
    assert_eq!(requests[2].method, HttpMethod::Get);
    assert_eq!(requests[2].path, "conversations/c1/activities");
}

#[tokio::test]
async fn poll_sends_stored_watermark() {
    let transport = ScriptedTransport::with_bodies(&[
        r#"{"conversationId":"c1"}"#,
        r#"{"watermark":"3","activities":[]}"#,
        r#"{"watermark":"4","activities":[{"from":{"id":"bot"},"text":"later","channelId":"directline"}]}"#,
    ]);
    let client = ready_client(&transport, "s3cret");
    let mut session = match ChatSession::open(client, user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };

    assert!(matches!(session.poll().await, Ok(ref replies) if replies.is_empty()));
    let replies = session.poll().await.unwrap_or_default();
    assert_eq!(replies.len(), 1);
    assert_eq!(transport.last_request().query_param("watermark"), Some("3"));
}

#[tokio::test]
async fn open_surfaces_service_error() {
    let transport =
        ScriptedTransport::with_bodies(&[r#"{"error":{"code":"Unauthorized","message":"bad secret"}}"#]);
    let client = ready_client(&transport, "s3cret");

    let result = ChatSession::open(client.clone(), user(), Duration::ZERO).await;
    match result {
        Err(ChatError::Service { code, message }) => {
            assert_eq!(code, "Unauthorized");
            assert_eq!(message.as_deref(), Some("bad secret"));
        }
        other => panic!("expected service error, got: {other:?}"),
    }
}

#[tokio::test]
async fn say_surfaces_transport_error() {
    let transport = ScriptedTransport::with_bodies(&[r#"{"conversationId":"c1"}"#]);
    transport.push_reply(Err(TransportError::HttpStatus {
        status: 502,
        body: "bad gateway".to_owned(),
    }));
    let client = ready_client(&transport, "s3cret");
    let mut session = match ChatSession::open(client, user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };

    let result = session.say("hello").await;
    assert!(matches!(result, Err(ChatError::Transport(_))));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn say_rejects_empty_text_without_network() {
    let transport = ScriptedTransport::with_bodies(&[r#"{"conversationId":"c1"}"#]);
    let client = ready_client(&transport, "s3cret");
    let mut session = match ChatSession::open(client, user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };

    let result = session.say("").await;
    assert!(matches!(
        result,
        Err(ChatError::Client(DirectLineError::InvalidArgument(_)))
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn empty_reply_is_no_response() {
    let transport = ScriptedTransport::with_bodies(&[r#"{"conversationId":"c1"}"#, ""]);
    let client = ready_client(&transport, "s3cret");
    let mut session = match ChatSession::open(client, user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };

    let result = session.say("hello").await;
    assert!(matches!(result, Err(ChatError::NoResponse)));
}

#[tokio::test]
async fn shared_client_use_does_not_desync_session() {
    let transport = ScriptedTransport::with_bodies(&[
        r#"{"conversationId":"c1"}"#,
        r#"{"watermark":"1","activities":[]}"#,
        r#"{"id":"c1|0002"}"#,
        r#"{"watermark":"3","activities":[{"from":{"id":"bot"},"text":"pong","channelId":"directline"}]}"#,
    ]);
    let client = ready_client(&transport, "s3cret");
    let mut session = match ChatSession::open(client.clone(), user(), Duration::ZERO).await {
        Ok(session) => session,
        Err(err) => panic!("session should open: {err}"),
    };

    // Another collaborator fetches on the same client between turns.
    let side = client.fetch_messages("c1", None).await;
    assert!(matches!(side, Ok(Some(BotEvent::MessageReceived { .. }))));

    let turn = match session.say("ping").await {
        Ok(turn) => turn,
        Err(err) => panic!("turn should succeed: {err}"),
    };
    assert_eq!(turn.sent_message_id, "c1|0002");
    assert_eq!(turn.replies.len(), 1);
    assert_eq!(turn.replies[0].text, "pong");
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn open_rejects_blank_conversation_id() {
    for body in [r#"{"conversationId":""}"#, r#"{"conversationId":"  "}"#] {
        let transport = ScriptedTransport::with_bodies(&[body]);
        let client = ready_client(&transport, "s3cret");

        let result = ChatSession::open(client.clone(), user(), Duration::ZERO).await;
        assert!(
            matches!(result, Err(ChatError::Malformed(_))),
            "{body} should not open a session"
        );
        assert_eq!(client.conversation_id(), None);
    }
}
