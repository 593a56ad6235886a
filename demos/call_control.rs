//! Example call control over AMI
//!
//! Toggles DND for an extension, runs a CLI command, then originates a call
//! and waits for its `OriginateResponse`.
//!
//! Usage: cargo run --example call_control -- <from> <to>

use asterisk_ami_tokio::{
    AmiClient, AmiEventType, Originate, DEFAULT_AMI_PORT, DND_FAMILY, DND_VALUE,
};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(from), Some(to)) = (args.next(), args.next()) else {
        eprintln!("usage: call_control <from> <to>");
        std::process::exit(2);
    };

    let secret = std::env::var("AMI_SECRET").unwrap_or_else(|_| "amp111".to_string());
    let (client, mut events) =
        AmiClient::connect("localhost", DEFAULT_AMI_PORT, "admin", &secret).await?;
    info!("Connected to Asterisk {}", client.asterisk_version().await?);

    // DND is an AstDB entry; present means on
    let dnd = client
        .db_get(DND_FAMILY, &from)
        .await?;
    info!("DND for {}: {}", from, if dnd.is_some() { "on" } else { "off" });
    if dnd.is_some() {
        client
            .db_del(DND_FAMILY, &from)
            .await?;
    } else {
        client
            .db_put(DND_FAMILY, &from, DND_VALUE)
            .await?;
    }
    info!("DND for {} toggled", from);

    let channels = client
        .command("core show channels count")
        .await?;
    for line in channels.output() {
        info!("{}", line);
    }

    let originate = Originate::new(format!("SIP/{}", to))
        .caller_id(to.as_str())
        .dialplan("from-internal", from.as_str(), "1")
        .timeout(Duration::from_secs(30))
        .run_async(true);
    let response = client
        .originate(originate)
        .await?;
    let action_id = response
        .action_id()
        .cloned();
    info!("Originate queued: {:?}", response.message());

    let outcome = tokio::time::timeout(Duration::from_secs(40), async {
        while let Some(event) = events
            .recv()
            .await
        {
            if event.is_event_type(AmiEventType::OriginateResponse)
                && event.action_id() == action_id.as_ref()
            {
                return Some(event);
            }
        }
        None
    })
    .await;

    match outcome {
        Ok(Some(event)) => info!(
            "Originate finished: {} on {}",
            event
                .header("Response")
                .map(String::as_str)
                .unwrap_or("?"),
            event
                .channel()
                .map(String::as_str)
                .unwrap_or("?")
        ),
        Ok(None) => warn!("Connection closed before the call was answered"),
        Err(_) => warn!("No OriginateResponse within 40s"),
    }

    client
        .disconnect()
        .await?;
    Ok(())
}
