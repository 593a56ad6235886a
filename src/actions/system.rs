//! Session-level actions: login, keepalive, CLI commands, event mask.

use std::fmt;

use crate::action::AmiAction;

/// Which events the server should send on this session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventMask {
    /// All event classes the account may read
    #[default]
    On,
    /// No events
    Off,
    /// Only the listed classes (`system`, `call`, `dtmf`, ...)
    Classes(Vec<String>),
}

impl EventMask {
    pub fn classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventMask::Classes(
            classes
                .into_iter()
                .map(Into::into)
                .collect(),
        )
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventMask::On => f.write_str("on"),
            EventMask::Off => f.write_str("off"),
            EventMask::Classes(classes) if classes.is_empty() => f.write_str("off"),
            EventMask::Classes(classes) => f.write_str(&classes.join(",")),
        }
    }
}

/// `Login` with either a plaintext secret or an MD5 challenge key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    Plain {
        username: String,
        secret: String,
        events: EventMask,
    },
    Md5 {
        username: String,
        /// `md5(challenge + secret)` as lowercase hex
        key: String,
        events: EventMask,
    },
}

impl Login {
    pub fn plain(
        username: impl Into<String>,
        secret: impl Into<String>,
        events: EventMask,
    ) -> Self {
        Login::Plain {
            username: username.into(),
            secret: secret.into(),
            events,
        }
    }

    /// Answer a `Challenge` response.
    pub fn md5(
        username: impl Into<String>,
        challenge: &str,
        secret: &str,
        events: EventMask,
    ) -> Self {
        let digest = md5::compute(format!("{}{}", challenge, secret));
        Login::Md5 {
            username: username.into(),
            key: format!("{:x}", digest),
            events,
        }
    }
}

impl From<Login> for AmiAction {
    fn from(login: Login) -> Self {
        match login {
            Login::Plain {
                username,
                secret,
                events,
            } => AmiAction::new("Login")
                .header("Username", username)
                .header("Secret", secret)
                .header("Events", events.to_string()),
            Login::Md5 {
                username,
                key,
                events,
            } => AmiAction::new("Login")
                .header("AuthType", "MD5")
                .header("Username", username)
                .header("Key", key)
                .header("Events", events.to_string()),
        }
    }
}

/// Ask for an MD5 login challenge: `Action: Challenge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Challenge;

impl From<Challenge> for AmiAction {
    fn from(_: Challenge) -> Self {
        AmiAction::new("Challenge").header("AuthType", "MD5")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Logoff;

impl From<Logoff> for AmiAction {
    fn from(_: Logoff) -> Self {
        AmiAction::new("Logoff")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ping;

impl From<Ping> for AmiAction {
    fn from(_: Ping) -> Self {
        AmiAction::new("Ping")
    }
}

/// Run an Asterisk CLI command, e.g. `core show channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command: String,
}

impl Command {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl From<Command> for AmiAction {
    fn from(cmd: Command) -> Self {
        AmiAction::new("Command").header("Command", cmd.command)
    }
}

/// Server settings; the response carries `AsteriskVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreSettings;

impl From<CoreSettings> for AmiAction {
    fn from(_: CoreSettings) -> Self {
        AmiAction::new("CoreSettings")
    }
}

/// Change the session's event mask after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Events {
    pub mask: EventMask,
}

impl From<Events> for AmiAction {
    fn from(events: Events) -> Self {
        AmiAction::new("Events").header("EventMask", events.mask.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_mask_display() {
        assert_eq!(EventMask::On.to_string(), "on");
        assert_eq!(EventMask::Off.to_string(), "off");
        assert_eq!(
            EventMask::classes(["system", "call"]).to_string(),
            "system,call"
        );
        assert_eq!(EventMask::Classes(Vec::new()).to_string(), "off");
    }

    #[test]
    fn plain_login() {
        let action: AmiAction = Login::plain("admin", "s3cret", EventMask::On).into();
        assert_eq!(
            action.to_wire_format("1"),
            "Action: Login\r\nActionID: 1\r\nUsername: admin\r\nSecret: s3cret\r\nEvents: on\r\n\r\n"
        );
    }

    #[test]
    fn md5_login_key() {
        let login = Login::md5("admin", "123456789", "secret", EventMask::Off);
        let expected = format!("{:x}", md5::compute("123456789secret"));
        match &login {
            Login::Md5 { key, .. } => {
                assert_eq!(key, &expected);
                assert_eq!(key.len(), 32);
            }
            other => panic!("expected Md5, got {:?}", other),
        }

        let action: AmiAction = login.into();
        assert_eq!(action.get_header("AuthType"), Some("MD5"));
        assert_eq!(action.get_header("Key"), Some(expected.as_str()));
        assert_eq!(action.get_header("Secret"), None);
        assert_eq!(action.get_header("Events"), Some("off"));
    }

    #[test]
    fn command_action() {
        let action: AmiAction = Command::new("core show version").into();
        assert_eq!(action.name(), "Command");
        assert_eq!(action.get_header("Command"), Some("core show version"));
    }

    #[test]
    fn events_action() {
        let action: AmiAction = Events {
            mask: EventMask::classes(["call"]),
        }
        .into();
        assert_eq!(action.get_header("EventMask"), Some("call"));
    }
}
