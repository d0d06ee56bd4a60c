//! Classification priority and shape coverage.

use directline::directline::{classify, BotEvent, DirectLineError};

fn classified(body: &str) -> Option<BotEvent> {
    match classify(body) {
        Ok(event) => event,
        Err(err) => panic!("body should classify: {err}"),
    }
}

#[test]
fn conversation_id_yields_conversation_started() {
    assert_eq!(
        classified(r#"{"conversationId":"abc123","token":"t","expires_in":1800}"#),
        Some(BotEvent::ConversationStarted {
            conversation_id: "abc123".to_owned()
        })
    );
}

#[test]
fn bare_id_yields_message_sent() {
    assert_eq!(
        classified(r#"{"id":"msg-1"}"#),
        Some(BotEvent::MessageSent {
            sent_message_id: "msg-1".to_owned()
        })
    );
}

#[test]
fn error_envelope_yields_error() {
    assert_eq!(
        classified(r#"{"error":{"code":"BadArgument","message":"bad"}}"#),
        Some(BotEvent::Error {
            code: "BadArgument".to_owned(),
            message: Some("bad".to_owned())
        })
    );
}

#[test]
fn error_without_message_has_no_message() {
    assert_eq!(
        classified(r#"{"error":{"code":"Unauthorized"}}"#),
        Some(BotEvent::Error {
            code: "Unauthorized".to_owned(),
            message: None
        })
    );
}

#[test]
fn error_wins_over_conversation_id() {
    let event = classified(r#"{"conversationId":"abc","error":{"code":"Conflict"}}"#);
    assert!(matches!(event, Some(BotEvent::Error { .. })));
}

#[test]
fn conversation_id_wins_over_id() {
    let event = classified(r#"{"id":"x","conversationId":"abc"}"#);
    assert_eq!(
        event,
        Some(BotEvent::ConversationStarted {
            conversation_id: "abc".to_owned()
        })
    );
}

#[test]
fn id_wins_over_activities() {
    let event = classified(r#"{"id":"x","activities":[]}"#);
    assert!(matches!(event, Some(BotEvent::MessageSent { .. })));
}

#[test]
fn activities_yield_message_received_in_order() {
    let body = r#"{
        "watermark": "5",
        "activities": [
            {"from": {"id": "user-1"}, "text": "hello", "channelId": "directline"},
            {"from": {"id": "bot", "name": "Echo"}, "text": "hi", "channelId": "directline"}
        ]
    }"#;
    match classified(body) {
        Some(BotEvent::MessageReceived {
            watermark,
            activities,
        }) => {
            assert_eq!(watermark.as_deref(), Some("5"));
            let texts: Vec<&str> = activities.iter().map(|a| a.text.as_str()).collect();
            assert_eq!(texts, vec!["hello", "hi"]);
        }
        other => panic!("expected MessageReceived, got: {other:?}"),
    }
}

#[test]
fn activities_without_watermark_have_none() {
    assert_eq!(
        classified(r#"{"activities":[]}"#),
        Some(BotEvent::MessageReceived {
            watermark: None,
            activities: Vec::new()
        })
    );
}

#[test]
fn one_bad_activity_fails_the_whole_fetch() {
    let body = r#"{"watermark":"3","activities":[
        {"from":{"id":"bot"},"text":"ok","channelId":"directline"},
        {"from":{"id":"bot"},"channelId":"directline"}
    ]}"#;
    assert!(matches!(
        classify(body),
        Err(DirectLineError::MalformedResponse(_))
    ));
}

#[test]
fn non_array_activities_are_malformed() {
    assert!(matches!(
        classify(r#"{"activities":{"text":"hi"}}"#),
        Err(DirectLineError::MalformedResponse(_))
    ));
}

#[test]
fn json_array_root_is_malformed() {
    assert!(matches!(
        classify("[]"),
        Err(DirectLineError::MalformedResponse(_))
    ));
}

#[test]
fn unknown_shape_yields_nothing() {
    assert_eq!(classified(r#"{"unexpected":true}"#), None);
}
