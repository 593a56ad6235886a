//! Actions that target a channel by name.

use crate::action::{AmiAction, ResponseCompletion};

/// Hang up a channel: `Action: Hangup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hangup {
    /// Channel name, e.g. `SIP/100-00000001`.
    pub channel: String,
    /// Q.850 cause code. If `None`, Asterisk uses its default.
    pub cause: Option<u16>,
}

impl Hangup {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            cause: None,
        }
    }
}

impl From<Hangup> for AmiAction {
    fn from(hangup: Hangup) -> Self {
        AmiAction::new("Hangup")
            .header("Channel", hangup.channel)
            .opt_header(
                "Cause",
                hangup
                    .cause
                    .map(|c| c.to_string()),
            )
    }
}

/// Send a channel elsewhere in the dialplan: `Action: Redirect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub channel: String,
    pub context: String,
    pub exten: String,
    pub priority: String,
}

impl From<Redirect> for AmiAction {
    fn from(redirect: Redirect) -> Self {
        AmiAction::new("Redirect")
            .header("Channel", redirect.channel)
            .header("Context", redirect.context)
            .header("Exten", redirect.exten)
            .header("Priority", redirect.priority)
    }
}

/// Read a channel or global variable: `Action: Getvar`.
///
/// The value comes back in the response's `Value` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Getvar {
    /// `None` reads a global variable.
    pub channel: Option<String>,
    pub variable: String,
}

impl From<Getvar> for AmiAction {
    fn from(getvar: Getvar) -> Self {
        AmiAction::new("Getvar")
            .opt_header("Channel", getvar.channel)
            .header("Variable", getvar.variable)
    }
}

/// Set a channel or global variable: `Action: Setvar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setvar {
    /// `None` sets a global variable.
    pub channel: Option<String>,
    pub variable: String,
    pub value: String,
}

impl From<Setvar> for AmiAction {
    fn from(setvar: Setvar) -> Self {
        AmiAction::new("Setvar")
            .opt_header("Channel", setvar.channel)
            .header("Variable", setvar.variable)
            .header("Value", setvar.value)
    }
}

/// List active channels. Answered by one `CoreShowChannel` event per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreShowChannels;

impl From<CoreShowChannels> for AmiAction {
    fn from(_: CoreShowChannels) -> Self {
        AmiAction::new("CoreShowChannels").completion(ResponseCompletion::EventList {
            terminator: Some("CoreShowChannelsComplete"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "SIP/100-00000001";

    #[test]
    fn hangup_without_cause() {
        let action: AmiAction = Hangup::new(CHANNEL).into();
        assert_eq!(
            action.to_wire_format("2"),
            format!(
                "Action: Hangup\r\nActionID: 2\r\nChannel: {}\r\n\r\n",
                CHANNEL
            )
        );
    }

    #[test]
    fn hangup_with_cause() {
        let action: AmiAction = Hangup {
            channel: CHANNEL.into(),
            cause: Some(17),
        }
        .into();
        assert_eq!(action.get_header("Cause"), Some("17"));
    }

    #[test]
    fn redirect() {
        let action: AmiAction = Redirect {
            channel: CHANNEL.into(),
            context: "from-internal".into(),
            exten: "200".into(),
            priority: "1".into(),
        }
        .into();
        assert_eq!(action.get_header("Context"), Some("from-internal"));
        assert_eq!(action.get_header("Exten"), Some("200"));
    }

    #[test]
    fn global_getvar_has_no_channel() {
        let action: AmiAction = Getvar {
            channel: None,
            variable: "TRUNK".into(),
        }
        .into();
        assert_eq!(action.get_header("Channel"), None);
        assert_eq!(action.get_header("Variable"), Some("TRUNK"));
    }

    #[test]
    fn setvar() {
        let action: AmiAction = Setvar {
            channel: Some(CHANNEL.into()),
            variable: "MONITOR".into(),
            value: "1".into(),
        }
        .into();
        assert_eq!(action.get_header("Channel"), Some(CHANNEL));
        assert_eq!(action.get_header("Value"), Some("1"));
    }

    #[test]
    fn core_show_channels_is_list() {
        let action: AmiAction = CoreShowChannels.into();
        assert_eq!(
            action.response_completion(),
            &ResponseCompletion::EventList {
                terminator: Some("CoreShowChannelsComplete")
            }
        );
    }
}
