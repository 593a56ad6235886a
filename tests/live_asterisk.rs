//! Integration tests against a live Asterisk instance.
//!
//! These tests require AMI on 127.0.0.1:5038 with a manager account
//! `admin`/`amp111` that has `read = all` and `write = all`. Override with
//! AMI_HOST, AMI_PORT, AMI_USERNAME and AMI_SECRET.
//! Run with: cargo test --test live_asterisk -- --ignored

use asterisk_ami_tokio::{
    AmiClient, AmiConnectOptions, AmiError, AmiEventStream, AmiEventType, AuthMethod,
    CoreShowChannels, EventMask, DEFAULT_AMI_PORT,
};
use std::time::Duration;

const AMI_HOST: &str = "127.0.0.1";
const AMI_USERNAME: &str = "admin";
const AMI_SECRET: &str = "amp111";

/// Extension used for DND round trips; any unused number works
const TEST_EXTENSION: &str = "999001";

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn port() -> u16 {
    std::env::var("AMI_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_AMI_PORT)
}

async fn connect_with(options: AmiConnectOptions) -> (AmiClient, AmiEventStream) {
    let (client, events) = AmiClient::connect_with_options(
        &env_or("AMI_HOST", AMI_HOST),
        port(),
        &env_or("AMI_USERNAME", AMI_USERNAME),
        &env_or("AMI_SECRET", AMI_SECRET),
        options,
    )
    .await
    .expect("failed to connect to Asterisk");
    client.set_command_timeout(Duration::from_secs(10));
    (client, events)
}

async fn connect() -> (AmiClient, AmiEventStream) {
    connect_with(AmiConnectOptions::default()).await
}

#[tokio::test]
#[ignore]
async fn live_connect_and_version() {
    let (client, _events) = connect().await;
    assert!(client.is_connected());
    assert!(!client
        .protocol_version()
        .is_empty());

    let version = client
        .asterisk_version()
        .await
        .unwrap();
    assert!(
        version
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit()),
        "unexpected version: {}",
        version
    );

    client
        .disconnect()
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn live_md5_login() {
    let (client, _events) = connect_with(AmiConnectOptions::new().auth(AuthMethod::Md5)).await;
    client
        .ping()
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn live_wrong_secret() {
    let result = AmiClient::connect(
        &env_or("AMI_HOST", AMI_HOST),
        port(),
        &env_or("AMI_USERNAME", AMI_USERNAME),
        "definitely-not-the-secret",
    )
    .await;
    assert!(matches!(
        result,
        Err(AmiError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
#[ignore]
async fn live_command_output() {
    let (client, _events) = connect_with(AmiConnectOptions::new().events(EventMask::Off)).await;

    let response = client
        .command("core show uptime")
        .await
        .unwrap();
    let text = response.output_text();
    assert!(text.contains("uptime"), "unexpected output: {}", text);
}

#[tokio::test]
#[ignore]
async fn live_unknown_command() {
    let (client, _events) = connect().await;

    match client
        .command("no such command here")
        .await
    {
        Err(AmiError::CommandFailed { message }) => {
            assert!(!message.is_empty())
        }
        other => panic!("Expected CommandFailed, got: {:?}", other),
    }
    assert!(client.is_connected());
}

#[tokio::test]
#[ignore]
async fn live_dnd_round_trip() {
    let (client, _events) = connect().await;

    client
        .db_put("DND", TEST_EXTENSION, "YES")
        .await
        .unwrap();
    assert_eq!(
        client
            .db_get("DND", TEST_EXTENSION)
            .await
            .unwrap(),
        Some("YES".to_string())
    );

    client
        .db_del("DND", TEST_EXTENSION)
        .await
        .unwrap();
    assert_eq!(
        client
            .db_get("DND", TEST_EXTENSION)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
#[ignore]
async fn live_core_show_channels_list() {
    let (client, _events) = connect().await;

    let response = client
        .send_action(CoreShowChannels)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    let last = response
        .events()
        .last()
        .expect("list should end with a completion event");
    assert_eq!(last.name(), "CoreShowChannelsComplete");
}

#[tokio::test]
#[ignore]
async fn live_reload_event() {
    let (client, mut events) = connect().await;

    client
        .command("module reload manager")
        .await
        .unwrap();

    let deadline = Duration::from_secs(10);
    let event = tokio::time::timeout(deadline, async {
        while let Some(event) = events
            .recv()
            .await
        {
            if event.event_type() == Some(AmiEventType::Reload) {
                return Some(event);
            }
        }
        None
    })
    .await
    .expect("timeout waiting for Reload")
    .expect("event stream closed");

    assert!(event
        .header("Module")
        .is_some());
}
