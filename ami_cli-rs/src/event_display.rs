//! Event display for ami_cli-rs

use std::sync::PoisonError;

use asterisk_ami_tokio::{AmiEvent, AmiEventType, EventDispatcher, HangupInfo, NewState};
use chrono::{DateTime, Local};
use colored::*;
use serde::Serialize;
use tracing::debug;

use crate::commands::CallerSlot;

/// One JSON line per event
#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: DateTime<Local>,
    #[serde(flatten)]
    event: &'a AmiEvent,
}

/// Prints channel events and remembers the ringing caller for `hangup`.
#[derive(Clone)]
pub struct EventDisplay {
    json: bool,
    last_caller: CallerSlot,
}

impl EventDisplay {
    pub fn new(json: bool, last_caller: CallerSlot) -> Self {
        Self { json, last_caller }
    }

    /// Dispatcher with `Newstate`, `Hangup` and catch-all handlers installed
    pub fn dispatcher(&self) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();

        let display = self.clone();
        dispatcher.on(AmiEventType::Newstate, move |event| display.on_new_state(event));
        let display = self.clone();
        dispatcher.on(AmiEventType::Hangup, move |event| display.on_hangup(event));
        let display = self.clone();
        dispatcher.on_unhandled(move |event| display.on_other(event));

        dispatcher
    }

    fn set_caller(&self, channel: Option<String>) {
        *self
            .last_caller
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = channel;
    }

    fn on_new_state(&self, event: &AmiEvent) {
        let Some(state) = event.new_state() else {
            return;
        };
        if state.is_ringing() {
            debug!("Ringing caller: {:?}", state.channel);
            self.set_caller(
                state
                    .channel
                    .clone(),
            );
        }

        if self.json {
            print_json(event);
        } else {
            println!("{}", format_new_state(&state, Local::now()));
        }
    }

    fn on_hangup(&self, event: &AmiEvent) {
        let Some(info) = event.hangup_info() else {
            return;
        };
        self.set_caller(None);

        if self.json {
            print_json(event);
        } else {
            println!("{}", format_hangup(&info, Local::now()));
        }
    }

    fn on_other(&self, event: &AmiEvent) {
        if self.json {
            print_json(event);
        } else {
            debug!("Unhandled event: {}", event.name());
        }
    }
}

fn print_json(event: &AmiEvent) {
    let line = JsonEvent {
        timestamp: Local::now(),
        event,
    };
    match serde_json::to_string(&line) {
        Ok(json) => println!("{}", json),
        Err(e) => debug!("Could not serialize {}: {}", event.name(), e),
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or("?")
}

fn format_new_state(state: &NewState, at: DateTime<Local>) -> String {
    let heading = format!("[{}] State change", at.format("%H:%M:%S"));
    let heading = if state.is_ringing() {
        heading
            .yellow()
            .bold()
    } else {
        heading.cyan()
    };
    format!(
        "{}\n  Code:        {}\n  Description: {}\n  From:        {} to {}\n",
        heading,
        or_unknown(&state.state_code),
        or_unknown(&state.state_desc),
        or_unknown(&state.caller_id_num),
        or_unknown(&state.connected_line_num),
    )
}

fn format_hangup(info: &HangupInfo, at: DateTime<Local>) -> String {
    let heading = format!("[{}] Hangup", at.format("%H:%M:%S"));
    let cause = info
        .cause
        .map(|c| c.code().to_string())
        .unwrap_or_else(|| "?".to_string());
    let description = info
        .cause_txt
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| {
            info.cause
                .and_then(|c| c.description())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{}\n  Cause:       {}\n  Description: {}\n  From:        {} to {}\n",
        heading.red(),
        cause,
        description,
        or_unknown(&info.caller_id_num),
        or_unknown(&info.connected_line_num),
    )
}
