//! Example AMI event listener
//!
//! Logs in with the `call` and `system` event classes and tracks calls from
//! `Newchannel` to `Hangup`.
//!
//! Usage: AMI_SECRET=amp111 cargo run --example event_listener

use asterisk_ami_tokio::{
    AmiClient, AmiConnectOptions, AmiError, AmiEvent, AmiEventType, ChannelState, EventMask,
    DEFAULT_AMI_PORT,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let username = std::env::var("AMI_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let secret = std::env::var("AMI_SECRET").unwrap_or_else(|_| "amp111".to_string());
    let options = AmiConnectOptions::new()
        .events(EventMask::classes(["call", "system"]))
        .keepalive_interval(Duration::from_secs(30))
        .liveness_timeout(Duration::from_secs(90));

    let (client, mut events) = match AmiClient::connect_with_options(
        "localhost",
        DEFAULT_AMI_PORT,
        &username,
        &secret,
        options,
    )
    .await
    {
        Ok(pair) => {
            info!("Successfully connected to Asterisk");
            pair
        }
        Err(AmiError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            error!("Failed to connect to Asterisk - is AMI enabled on localhost:5038?");
            return Err(e.into());
        }
        Err(e) => {
            error!("Failed to connect: {}", e);
            return Err(e.into());
        }
    };

    let mut active_calls: HashMap<String, CallInfo> = HashMap::new();
    let mut event_count = 0u64;

    info!("Listening for events... Press Ctrl+C to exit");

    while let Some(event) = events
        .recv()
        .await
    {
        event_count += 1;
        debug!("Received event #{}: {}", event_count, event.name());
        process_event(&event, &mut active_calls);
    }

    warn!(
        "Connection ended ({:?}), total events: {}",
        client.status(),
        event_count
    );
    client
        .disconnect()
        .await?;

    Ok(())
}

fn process_event(event: &AmiEvent, active_calls: &mut HashMap<String, CallInfo>) {
    match event.event_type() {
        Some(AmiEventType::Newchannel) => {
            if let Some(uid) = event.unique_id() {
                let caller_id = event
                    .caller_id_num()
                    .map(String::as_str)
                    .unwrap_or("Unknown");
                let exten = event
                    .header("Exten")
                    .map(String::as_str)
                    .unwrap_or("Unknown");

                info!("New channel: {} -> {}", caller_id, exten);
                active_calls.insert(
                    uid.clone(),
                    CallInfo {
                        caller_id: caller_id.to_string(),
                        start_time: Instant::now(),
                        answered_time: None,
                    },
                );
            }
        }
        Some(AmiEventType::Newstate) => {
            let Some(state) = event.new_state() else {
                return;
            };
            if state.is_ringing() {
                info!("Ringing: {:?}", state.channel);
            }
            if state.state != Some(ChannelState::Up) {
                return;
            }
            let Some(call_info) = state
                .unique_id
                .as_ref()
                .and_then(|uid| active_calls.get_mut(uid))
            else {
                return;
            };
            if call_info
                .answered_time
                .is_none()
            {
                call_info.answered_time = Some(Instant::now());
                info!(
                    "Call answered: {} (ring time: {:.2}s)",
                    call_info.caller_id,
                    call_info
                        .start_time
                        .elapsed()
                        .as_secs_f64()
                );
            }
        }
        Some(AmiEventType::Hangup) => {
            let Some(info) = event.hangup_info() else {
                return;
            };
            let cause = info
                .cause
                .and_then(|c| c.description())
                .unwrap_or("Unknown");
            let Some(call_info) = info
                .unique_id
                .as_ref()
                .and_then(|uid| active_calls.remove(uid))
            else {
                return;
            };
            match call_info.answered_time {
                Some(answered) => info!(
                    "Call ended: {} (cause: {}, talk time: {:.2}s)",
                    call_info.caller_id,
                    cause,
                    answered
                        .elapsed()
                        .as_secs_f64()
                ),
                None => info!(
                    "Call ended: {} (cause: {}, not answered)",
                    call_info.caller_id, cause
                ),
            }
        }
        Some(AmiEventType::DtmfEnd) => {
            if let (Some(channel), Some(digit)) = (event.channel(), event.header("Digit")) {
                info!("DTMF: {} pressed '{}'", channel, digit);
            }
        }
        Some(AmiEventType::FullyBooted) => info!("Asterisk is fully booted"),
        Some(AmiEventType::Shutdown) => warn!("Asterisk is shutting down"),
        _ => {
            debug!("Ignoring event: {}", event.name());
        }
    }
}

#[derive(Debug, Clone)]
struct CallInfo {
    caller_id: String,
    start_time: Instant,
    answered_time: Option<Instant>,
}
