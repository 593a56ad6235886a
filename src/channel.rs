//! Channel-related data types extracted from AMI event headers.

use crate::event::{AmiEvent, AmiEventType};
use std::fmt;
use std::str::FromStr;

/// Channel state as reported in the `ChannelState` header.
///
/// Codes follow Asterisk's `ast_channel_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelState {
    Down = 0,
    Reserved = 1,
    OffHook = 2,
    Dialing = 3,
    Ring = 4,
    Ringing = 5,
    Up = 6,
    Busy = 7,
    DialingOffHook = 8,
    PreRing = 9,
    Unknown = 10,
}

impl ChannelState {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ChannelState::Down,
            1 => ChannelState::Reserved,
            2 => ChannelState::OffHook,
            3 => ChannelState::Dialing,
            4 => ChannelState::Ring,
            5 => ChannelState::Ringing,
            6 => ChannelState::Up,
            7 => ChannelState::Busy,
            8 => ChannelState::DialingOffHook,
            9 => ChannelState::PreRing,
            10 => ChannelState::Unknown,
            _ => return None,
        })
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Text Asterisk sends in `ChannelStateDesc`
    pub fn description(&self) -> &'static str {
        match self {
            ChannelState::Down => "Down",
            ChannelState::Reserved => "Rsrvd",
            ChannelState::OffHook => "OffHook",
            ChannelState::Dialing => "Dialing",
            ChannelState::Ring => "Ring",
            ChannelState::Ringing => "Ringing",
            ChannelState::Up => "Up",
            ChannelState::Busy => "Busy",
            ChannelState::DialingOffHook => "Dialing Offhook",
            ChannelState::PreRing => "Pre-ring",
            ChannelState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for ChannelState {
    type Err = ();

    /// Accepts either the numeric code or the description.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or(());
        }
        (0..=10)
            .filter_map(Self::from_code)
            .find(|state| {
                state
                    .description()
                    .eq_ignore_ascii_case(s)
            })
            .ok_or(())
    }
}

/// Q.850 hangup cause from the `Cause` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HangupCause(pub u16);

impl HangupCause {
    pub const NORMAL_CLEARING: HangupCause = HangupCause(16);
    pub const USER_BUSY: HangupCause = HangupCause(17);

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Description for common causes; `None` for codes not listed here.
    pub fn description(&self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "Unknown",
            1 => "Unallocated (unassigned) number",
            3 => "No route to destination",
            16 => "Normal Clearing",
            17 => "User busy",
            18 => "No user responding",
            19 => "User alerting, no answer",
            21 => "Call Rejected",
            22 => "Number changed",
            27 => "Destination out of order",
            28 => "Invalid number format",
            31 => "Normal, unspecified",
            34 => "Circuit/channel congestion",
            38 => "Network out of order",
            41 => "Temporary failure",
            42 => "Switching equipment congestion",
            58 => "Bearer capability not available",
            127 => "Interworking, unspecified",
            _ => return None,
        })
    }
}

impl fmt::Display for HangupCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => write!(f, "{} ({})", desc, self.0),
            None => write!(f, "cause {}", self.0),
        }
    }
}

/// Fields of a `Newstate` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewState {
    pub channel: Option<String>,
    /// Raw `ChannelState` header
    pub state_code: Option<String>,
    pub state: Option<ChannelState>,
    pub state_desc: Option<String>,
    pub caller_id_num: Option<String>,
    pub connected_line_num: Option<String>,
    pub unique_id: Option<String>,
}

impl NewState {
    /// `None` unless the event is a `Newstate`.
    pub fn from_event(event: &AmiEvent) -> Option<Self> {
        if !event.is_event_type(AmiEventType::Newstate) {
            return None;
        }
        let state_code = event
            .header("ChannelState")
            .cloned();
        Some(Self {
            channel: event
                .channel()
                .cloned(),
            state: state_code
                .as_deref()
                .and_then(|s| s.parse().ok()),
            state_code,
            state_desc: event
                .header("ChannelStateDesc")
                .cloned(),
            caller_id_num: event
                .caller_id_num()
                .cloned(),
            connected_line_num: event
                .connected_line_num()
                .cloned(),
            unique_id: event
                .unique_id()
                .cloned(),
        })
    }

    /// Channel rang (state 5) and names a channel that can be hung up.
    pub fn is_ringing(&self) -> bool {
        self.state == Some(ChannelState::Ringing)
            && self
                .channel
                .as_deref()
                .is_some_and(|c| !c.is_empty())
    }
}

/// Fields of a `Hangup` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangupInfo {
    pub channel: Option<String>,
    pub cause: Option<HangupCause>,
    pub cause_txt: Option<String>,
    pub caller_id_num: Option<String>,
    pub connected_line_num: Option<String>,
    pub unique_id: Option<String>,
}

impl HangupInfo {
    /// `None` unless the event is a `Hangup`.
    pub fn from_event(event: &AmiEvent) -> Option<Self> {
        if !event.is_event_type(AmiEventType::Hangup) {
            return None;
        }
        Some(Self {
            channel: event
                .channel()
                .cloned(),
            cause: event
                .header("Cause")
                .and_then(|c| {
                    c.trim()
                        .parse()
                        .ok()
                })
                .map(HangupCause),
            cause_txt: event
                .header("Cause-txt")
                .cloned(),
            caller_id_num: event
                .caller_id_num()
                .cloned(),
            connected_line_num: event
                .connected_line_num()
                .cloned(),
            unique_id: event
                .unique_id()
                .cloned(),
        })
    }
}

impl AmiEvent {
    /// Parsed `ChannelState` header, on any event that carries one
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.header("ChannelState")
            .and_then(|s| s.parse().ok())
    }

    pub fn new_state(&self) -> Option<NewState> {
        NewState::from_event(self)
    }

    pub fn hangup_info(&self) -> Option<HangupInfo> {
        HangupInfo::from_event(self)
    }
}
