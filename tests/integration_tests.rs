//! Integration tests for the public API
//!
//! These tests need no Asterisk. Tests against a mock server live in
//! `connection_tests.rs`; tests against a real PBX in `live_asterisk.rs`.

use asterisk_ami_tokio::{
    AmiAction, AmiConnectOptions, AmiError, AmiEvent, AmiEventType, AmiResponse, AuthMethod,
    ChannelState, Command, CoreShowChannels, DbGet, EventDispatcher, EventMask, HangupCause,
    Login, Originate, OriginateError, ResponseCompletion, ResponseStatus, DEFAULT_AMI_PORT,
    DND_FAMILY, DND_VALUE,
};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn response(pairs: &[(&str, &str)]) -> AmiResponse {
    let headers: IndexMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AmiResponse::new(headers, Vec::new())
}

fn event(name: &str, headers: &[(&str, &str)]) -> AmiEvent {
    let mut event = AmiEvent::new(name);
    for (k, v) in headers {
        event.set_header(*k, *v);
    }
    event
}

#[test]
fn test_constants() {
    assert_eq!(DEFAULT_AMI_PORT, 5038);
    assert_eq!(DND_FAMILY, "DND");
    assert_eq!(DND_VALUE, "YES");
}

#[test]
fn test_action_wire_format() {
    let action: AmiAction = Command::new("core show channels").into();
    assert_eq!(
        action.to_wire_format("42"),
        "Action: Command\r\nActionID: 42\r\nCommand: core show channels\r\n\r\n"
    );

    // Header values cannot smuggle extra headers in
    let action = AmiAction::new("UserEvent").header("Body", "one\r\nAction: Hangup");
    let wire = action.to_wire_format("1");
    assert_eq!(wire.matches("\r\n").count(), 4);
    assert!(wire.contains("Body: one  Action: Hangup\r\n"));
}

#[test]
fn test_login_variants() {
    let plain: AmiAction = Login::plain("admin", "s3cret", EventMask::Off).into();
    assert_eq!(plain.get_header("Secret"), Some("s3cret"));
    assert_eq!(plain.get_header("Events"), Some("off"));
    assert_eq!(plain.get_header("AuthType"), None);

    let md5: AmiAction = Login::md5("admin", "840415273", "s3cret", EventMask::On).into();
    assert_eq!(md5.get_header("AuthType"), Some("MD5"));
    assert_eq!(md5.get_header("Secret"), None);
    let key = md5
        .get_header("Key")
        .unwrap();
    assert_eq!(key.len(), 32);
    assert_eq!(
        key,
        format!("{:x}", md5::compute("840415273s3cret"))
    );
}

#[test]
fn test_list_actions_wait_for_events() {
    let db_get: AmiAction = DbGet::new("DND", "100").into();
    assert!(matches!(
        db_get.response_completion(),
        ResponseCompletion::EventList { .. }
    ));

    let channels: AmiAction = CoreShowChannels.into();
    assert_eq!(
        channels.response_completion(),
        &ResponseCompletion::EventList {
            terminator: Some("CoreShowChannelsComplete")
        }
    );

    let ping: AmiAction = asterisk_ami_tokio::Ping.into();
    assert_eq!(ping.response_completion(), &ResponseCompletion::Single);
}

#[test]
fn test_originate_validation() {
    assert_eq!(
        Originate::new("  ")
            .dialplan("from-internal", "100", "1")
            .validate(),
        Err(OriginateError::EmptyChannel)
    );
    assert_eq!(
        Originate::new("SIP/200").validate(),
        Err(OriginateError::MissingTarget)
    );
    assert_eq!(
        Originate::new("SIP/200")
            .exten("100")
            .validate(),
        Err(OriginateError::MissingContext)
    );
    assert_eq!(
        Originate::new("SIP/200")
            .dialplan("from-internal", "100", "1")
            .application("Playback", Some("hello-world"))
            .validate(),
        Err(OriginateError::ConflictingTarget)
    );

    let action = assert_ok!(Originate::new("SIP/200")
        .application("Playback", Some("hello-world"))
        .variable("CALLERID(name)", "Reception")
        .variable("__TRANSFER", "yes")
        .to_action());
    assert_eq!(action.get_header("Application"), Some("Playback"));
    assert_eq!(action.get_header("Data"), Some("hello-world"));
    assert_eq!(action.get_header("Async"), None);
    let variables: Vec<&str> = action
        .headers()
        .iter()
        .filter(|(k, _)| k == "Variable")
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(variables, ["CALLERID(name)=Reception", "__TRANSFER=yes"]);
}

#[test]
fn test_originate_error_converts() {
    let err: AmiError = OriginateError::MissingTarget.into();
    assert!(matches!(err, AmiError::Originate(_)));
    assert!(!err.is_connection_error());
}

#[test]
fn test_response_status() {
    assert_eq!(ResponseStatus::parse("success"), ResponseStatus::Success);
    assert_eq!(ResponseStatus::parse("Error"), ResponseStatus::Error);
    assert_eq!(ResponseStatus::parse("Follows"), ResponseStatus::Follows);
    assert_eq!(ResponseStatus::parse("Goodbye"), ResponseStatus::Goodbye);
    assert_eq!(
        ResponseStatus::parse("Pong"),
        ResponseStatus::Other("Pong".to_string())
    );
    assert!(ResponseStatus::Goodbye.is_success());
    assert!(!ResponseStatus::Other("Pong".to_string()).is_success());
}

#[test]
fn test_response_into_result() {
    let ok = response(&[("Response", "Success"), ("Message", "Added")]);
    assert_ok!(ok.into_result());

    let err = response(&[("Response", "Error"), ("Message", "Permission denied")]);
    match assert_err!(err.into_result()) {
        AmiError::CommandFailed { message } => assert_eq!(message, "Permission denied"),
        other => panic!("Expected CommandFailed, got: {:?}", other),
    }

    let bare = response(&[("Response", "Error")]);
    match assert_err!(bare.into_result()) {
        AmiError::CommandFailed { message } => assert_eq!(message, "Response: Error"),
        other => panic!("Expected CommandFailed, got: {:?}", other),
    }

    let odd = response(&[("Response", "Pong"), ("Ping", "Pong")]);
    match assert_err!(odd.into_result()) {
        AmiError::UnexpectedResponse { status } => assert_eq!(status, "Pong"),
        other => panic!("Expected UnexpectedResponse, got: {:?}", other),
    }
}

#[test]
fn test_event_types() {
    assert_eq!(
        AmiEventType::parse_event_type("Newstate"),
        Some(AmiEventType::Newstate)
    );
    assert_eq!(
        AmiEventType::parse_event_type("DBGetResponse"),
        Some(AmiEventType::DbGetResponse)
    );
    assert_eq!(AmiEventType::parse_event_type("NoSuchEvent"), None);
    assert_eq!(AmiEventType::Hangup.to_string(), "Hangup");

    let unknown = event("MyCustomEvent", &[]);
    assert_eq!(unknown.event_type(), None);
    assert_eq!(unknown.name(), "MyCustomEvent");
}

#[test]
fn test_channel_views() {
    let ringing = event(
        "Newstate",
        &[
            ("Channel", "PJSIP/100-00000001"),
            ("ChannelState", "5"),
            ("ChannelStateDesc", "Ringing"),
            ("CallerIDNum", "100"),
        ],
    );
    let state = ringing
        .new_state()
        .unwrap();
    assert!(state.is_ringing());
    assert_eq!(state.state, Some(ChannelState::Ringing));
    assert_eq!(state.connected_line_num, None);

    // No channel name: nothing to hang up
    let anonymous = event("Newstate", &[("ChannelState", "5")]);
    assert!(!anonymous
        .new_state()
        .unwrap()
        .is_ringing());

    let up = event("Newstate", &[("Channel", "PJSIP/100-00000001"), ("ChannelState", "6")]);
    assert!(!up
        .new_state()
        .unwrap()
        .is_ringing());
    assert!(up
        .hangup_info()
        .is_none());

    let hangup = event("Hangup", &[("Cause", "34"), ("Cause-txt", "")]);
    let info = hangup
        .hangup_info()
        .unwrap();
    assert_eq!(info.cause, Some(HangupCause(34)));
    assert_eq!(
        HangupCause(34).description(),
        Some("Circuit/channel congestion")
    );
    assert!(hangup
        .new_state()
        .is_none());
}

#[test]
fn test_channel_state_codes() {
    for code in 0..=10u8 {
        let state = ChannelState::from_code(code).unwrap();
        assert_eq!(state.code(), code);
        assert!(!state
            .description()
            .is_empty());
    }
    assert_eq!(ChannelState::from_code(11), None);
}

#[test]
fn test_json_event_serialization() {
    let e = event(
        "Hangup",
        &[("Channel", "SIP/100-00000001"), ("Cause", "16")],
    );
    let json = e
        .to_json()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "Hangup");
    assert_eq!(value["headers"]["Event"], "Hangup");
    assert_eq!(value["headers"]["Cause"], "16");

    let back: AmiEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, e);
}

#[test]
fn test_error_classification() {
    assert!(AmiError::ConnectionClosed.is_connection_error());
    assert!(AmiError::NotConnected.is_connection_error());
    assert!(AmiError::HeartbeatExpired { interval_ms: 1000 }.is_connection_error());
    assert!(!AmiError::auth_failed("Authentication failed").is_recoverable());
    assert!(AmiError::CommandFailed {
        message: "No such command".into()
    }
    .is_recoverable());
    assert_eq!(
        AmiError::Timeout { timeout_ms: 5000 }.to_string(),
        "Operation timed out after 5000ms"
    );
}

#[test]
fn test_connect_options_builder() {
    let options = AmiConnectOptions::new()
        .connect_timeout(Duration::from_secs(2))
        .command_timeout(Duration::from_secs(30))
        .auth(AuthMethod::Md5)
        .events(EventMask::classes(["call", "system"]))
        .event_queue_size(0)
        .keepalive_interval(Duration::from_secs(20))
        .liveness_timeout(Duration::from_secs(60));
    let debug = format!("{:?}", options);
    assert!(debug.contains("Md5"));
    assert!(debug.contains("event_queue_size: 1"));
}

#[tokio::test]
async fn test_dispatcher_over_plain_stream() {
    let hangups = Arc::new(Mutex::new(0));
    let mut dispatcher = EventDispatcher::new();
    {
        let hangups = hangups.clone();
        dispatcher.on(AmiEventType::Hangup, move |_| {
            *hangups
                .lock()
                .unwrap() += 1
        });
    }
    assert!(dispatcher.has_handlers(AmiEventType::Hangup));
    assert!(!dispatcher.has_handlers(AmiEventType::Newstate));

    let stream = futures_util::stream::iter(vec![
        event("Hangup", &[]),
        event("Newstate", &[]),
        event("Hangup", &[]),
    ]);
    let total = dispatcher
        .run(stream)
        .await;
    assert_eq!(total, 3);
    assert_eq!(
        *hangups
            .lock()
            .unwrap(),
        2
    );
}
