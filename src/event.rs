//! AMI event types and structures

use crate::{
    constants::*,
    error::{AmiError, AmiResult},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! event_types {
    ($($variant:ident => $name:literal,)+) => {
        /// Asterisk manager events this crate knows by name.
        ///
        /// Events outside this list still arrive as [`AmiEvent`]s, with
        /// [`AmiEvent::event_type`] returning `None`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum AmiEventType {
            $($variant,)+
        }

        impl AmiEventType {
            /// All known event types
            pub const ALL: &'static [AmiEventType] = &[$(AmiEventType::$variant,)+];

            /// Wire name, e.g. `Newstate`
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AmiEventType::$variant => $name,)+
                }
            }

            /// Parse an event name, ignoring ASCII case
            pub fn parse_event_type(s: &str) -> Option<Self> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Some(AmiEventType::$variant);
                    }
                )+
                None
            }
        }
    };
}

event_types! {
    FullyBooted => "FullyBooted",
    Shutdown => "Shutdown",
    Reload => "Reload",
    SuccessfulAuth => "SuccessfulAuth",
    ChallengeSent => "ChallengeSent",
    InvalidPassword => "InvalidPassword",
    FailedAcl => "FailedACL",
    Newchannel => "Newchannel",
    Newstate => "Newstate",
    Newexten => "Newexten",
    NewCallerid => "NewCallerid",
    NewConnectedLine => "NewConnectedLine",
    NewAccountCode => "NewAccountCode",
    Rename => "Rename",
    VarSet => "VarSet",
    Hangup => "Hangup",
    HangupRequest => "HangupRequest",
    SoftHangupRequest => "SoftHangupRequest",
    DialBegin => "DialBegin",
    DialState => "DialState",
    DialEnd => "DialEnd",
    Hold => "Hold",
    Unhold => "Unhold",
    BridgeCreate => "BridgeCreate",
    BridgeEnter => "BridgeEnter",
    BridgeLeave => "BridgeLeave",
    BridgeDestroy => "BridgeDestroy",
    BlindTransfer => "BlindTransfer",
    AttendedTransfer => "AttendedTransfer",
    DtmfBegin => "DTMFBegin",
    DtmfEnd => "DTMFEnd",
    MusicOnHoldStart => "MusicOnHoldStart",
    MusicOnHoldStop => "MusicOnHoldStop",
    OriginateResponse => "OriginateResponse",
    DbGetResponse => "DBGetResponse",
    DbGetComplete => "DBGetComplete",
    CoreShowChannel => "CoreShowChannel",
    CoreShowChannelsComplete => "CoreShowChannelsComplete",
    Status => "Status",
    StatusComplete => "StatusComplete",
    PeerStatus => "PeerStatus",
    ContactStatus => "ContactStatus",
    Registry => "Registry",
    DeviceStateChange => "DeviceStateChange",
    ExtensionStatus => "ExtensionStatus",
    QueueCallerJoin => "QueueCallerJoin",
    QueueCallerLeave => "QueueCallerLeave",
    QueueMemberStatus => "QueueMemberStatus",
    AgentCalled => "AgentCalled",
    AgentConnect => "AgentConnect",
    AgentComplete => "AgentComplete",
    UserEvent => "UserEvent",
    Cdr => "Cdr",
    Cel => "CEL",
    RtcpSent => "RTCPSent",
    RtcpReceived => "RTCPReceived",
}

impl fmt::Display for AmiEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AMI event: the `Event:` name plus all headers in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    /// Event name as sent by Asterisk
    pub name: String,
    /// Parsed event type, `None` for events this crate does not know
    pub event_type: Option<AmiEventType>,
    /// Headers in wire order, `Event` included
    pub headers: IndexMap<String, String>,
}

impl AmiEvent {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut headers = IndexMap::new();
        headers.insert(HEADER_EVENT.to_string(), name.clone());
        Self {
            event_type: AmiEventType::parse_event_type(&name),
            name,
            headers,
        }
    }

    pub fn with_type(event_type: AmiEventType) -> Self {
        Self::new(event_type.as_str())
    }

    /// Build from a parsed header block; fails without an `Event` header.
    pub fn from_headers(headers: IndexMap<String, String>) -> AmiResult<Self> {
        let name = headers
            .get(HEADER_EVENT)
            .cloned()
            .ok_or_else(|| AmiError::MissingHeader {
                header: HEADER_EVENT.to_string(),
            })?;
        Ok(Self {
            event_type: AmiEventType::parse_event_type(&name),
            name,
            headers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_type(&self) -> Option<AmiEventType> {
        self.event_type
    }

    pub fn is_event_type(&self, event_type: AmiEventType) -> bool {
        self.event_type == Some(event_type)
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .get(name)
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into(), value.into());
    }

    /// `ActionID` of the action this event answers, if any
    pub fn action_id(&self) -> Option<&String> {
        self.header(HEADER_ACTION_ID)
    }

    pub fn privilege(&self) -> Option<&String> {
        self.header(HEADER_PRIVILEGE)
    }

    pub fn channel(&self) -> Option<&String> {
        self.header(HEADER_CHANNEL)
    }

    pub fn unique_id(&self) -> Option<&String> {
        self.header(HEADER_UNIQUE_ID)
    }

    pub fn caller_id_num(&self) -> Option<&String> {
        self.header(HEADER_CALLER_ID_NUM)
    }

    pub fn connected_line_num(&self) -> Option<&String> {
        self.header(HEADER_CONNECTED_LINE_NUM)
    }

    /// `true` for the event closing an `EventList: start` response
    pub fn is_list_complete(&self) -> bool {
        self.header(HEADER_EVENT_LIST)
            .is_some_and(|v| v.eq_ignore_ascii_case(EVENT_LIST_COMPLETE))
    }

    pub fn to_json(&self) -> AmiResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
