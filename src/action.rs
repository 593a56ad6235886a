//! Action serialization and response handling

use crate::{
    constants::*,
    error::{AmiError, AmiResult},
    event::AmiEvent,
};
use indexmap::IndexMap;
use std::fmt;

/// Value of the `Response:` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Error,
    /// Legacy command output follows
    Follows,
    /// Reply to `Logoff`
    Goodbye,
    Other(String),
}

impl ResponseStatus {
    pub fn parse(s: &str) -> Self {
        match s
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "success" => ResponseStatus::Success,
            "error" => ResponseStatus::Error,
            "follows" => ResponseStatus::Follows,
            "goodbye" => ResponseStatus::Goodbye,
            _ => ResponseStatus::Other(s.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Success | ResponseStatus::Follows | ResponseStatus::Goodbye
        )
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success => write!(f, "Success"),
            ResponseStatus::Error => write!(f, "Error"),
            ResponseStatus::Follows => write!(f, "Follows"),
            ResponseStatus::Goodbye => write!(f, "Goodbye"),
            ResponseStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Response to an AMI action
#[derive(Debug, Clone)]
pub struct AmiResponse {
    status: ResponseStatus,
    headers: IndexMap<String, String>,
    output: Vec<String>,
    events: Vec<AmiEvent>,
}

impl AmiResponse {
    pub fn new(headers: IndexMap<String, String>, output: Vec<String>) -> Self {
        let status = headers
            .get(HEADER_RESPONSE)
            .map(|s| ResponseStatus::parse(s))
            .unwrap_or_else(|| ResponseStatus::Other(String::new()));

        Self {
            status,
            headers,
            output,
            events: Vec::new(),
        }
    }

    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        self.status
            .is_success()
    }

    /// `Message:` header, present on most responses
    pub fn message(&self) -> Option<&String> {
        self.headers
            .get(HEADER_MESSAGE)
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .get(name)
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn action_id(&self) -> Option<&String> {
        self.headers
            .get(HEADER_ACTION_ID)
    }

    /// `true` when the server announced a list of events to follow.
    pub fn starts_event_list(&self) -> bool {
        self.headers
            .get(HEADER_EVENT_LIST)
            .is_some_and(|v| v.eq_ignore_ascii_case(EVENT_LIST_START))
    }

    /// Command output lines (`Output:` headers or legacy raw output)
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        self.output
            .join("\n")
    }

    /// Events collected for a list action, in arrival order
    pub fn events(&self) -> &[AmiEvent] {
        &self.events
    }

    pub(crate) fn push_event(&mut self, event: AmiEvent) {
        self.events
            .push(event);
    }

    /// `Ok` for success statuses.
    ///
    /// `Response: Error` becomes `CommandFailed`; any status this crate does
    /// not know becomes `UnexpectedResponse`.
    pub fn into_result(self) -> AmiResult<Self> {
        match self.status {
            ResponseStatus::Success | ResponseStatus::Follows | ResponseStatus::Goodbye => Ok(self),
            ResponseStatus::Error => {
                let message = self
                    .message()
                    .cloned()
                    .unwrap_or_else(|| format!("Response: {}", self.status));
                Err(AmiError::CommandFailed { message })
            }
            ResponseStatus::Other(status) => Err(AmiError::UnexpectedResponse { status }),
        }
    }
}

/// How the correlator decides an action is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCompletion {
    /// The `Response:` message alone
    Single,
    /// The response is followed by events carrying the same `ActionID`.
    ///
    /// The list ends with an event whose `EventList` header is `Complete`.
    /// When the response does not announce `EventList: start`, an event
    /// named `terminator` ends it instead.
    EventList { terminator: Option<&'static str> },
}

/// An action ready to be written to the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiAction {
    name: String,
    headers: Vec<(String, String)>,
    completion: ResponseCompletion,
}

impl AmiAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            completion: ResponseCompletion::Single,
        }
    }

    /// Append a header. Keys may repeat.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.into(), value.into()));
        self
    }

    /// Append a header only when `value` is present.
    pub fn opt_header<V: Into<String>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.header(name, value),
            None => self,
        }
    }

    pub fn completion(mut self, completion: ResponseCompletion) -> Self {
        self.completion = completion;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn response_completion(&self) -> &ResponseCompletion {
        &self.completion
    }

    /// Serialize with the given `ActionID`.
    ///
    /// CR and LF inside values would end the header early, so they are
    /// replaced with spaces.
    pub fn to_wire_format(&self, action_id: &str) -> String {
        let mut result = String::with_capacity(64 + self.headers.len() * 32);
        push_header(&mut result, HEADER_ACTION, &self.name);
        push_header(&mut result, HEADER_ACTION_ID, action_id);
        for (key, value) in &self.headers {
            push_header(&mut result, key, value);
        }
        result.push_str(LINE_TERMINATOR);
        result
    }
}

fn push_header(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    if value.contains(['\r', '\n']) {
        out.push_str(&value.replace(['\r', '\n'], " "));
    } else {
        out.push_str(value);
    }
    out.push_str(LINE_TERMINATOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_wire_format_order_and_repeats() {
        let action = AmiAction::new("Originate")
            .header("Channel", "SIP/100")
            .header("Variable", "a=1")
            .header("Variable", "b=2");

        assert_eq!(
            action.to_wire_format("42"),
            "Action: Originate\r\nActionID: 42\r\nChannel: SIP/100\r\nVariable: a=1\r\nVariable: b=2\r\n\r\n"
        );
    }

    #[test]
    fn test_wire_format_strips_newlines() {
        let action = AmiAction::new("Command").header("Command", "core show\r\nversion");
        assert_eq!(
            action.to_wire_format("1"),
            "Action: Command\r\nActionID: 1\r\nCommand: core show  version\r\n\r\n"
        );
    }

    #[test]
    fn test_opt_header() {
        let action = AmiAction::new("Hangup")
            .header("Channel", "SIP/100-0001")
            .opt_header("Cause", None::<String>)
            .opt_header("Reason", Some("test"));
        assert_eq!(action.get_header("cause"), None);
        assert_eq!(action.get_header("reason"), Some("test"));
    }

    #[test]
    fn test_response_status_parse() {
        assert_eq!(ResponseStatus::parse("Success"), ResponseStatus::Success);
        assert_eq!(ResponseStatus::parse("error"), ResponseStatus::Error);
        assert_eq!(ResponseStatus::parse("Follows"), ResponseStatus::Follows);
        assert_eq!(
            ResponseStatus::parse("Pong"),
            ResponseStatus::Other("Pong".to_string())
        );
        assert!(ResponseStatus::Goodbye.is_success());
        assert!(!ResponseStatus::Other("Pong".into()).is_success());
    }

    #[test]
    fn test_into_result_error_uses_message() {
        let response = AmiResponse::new(
            headers(&[
                ("Response", "Error"),
                ("ActionID", "9"),
                ("Message", "Database entry not found"),
            ]),
            Vec::new(),
        );
        assert!(!response.is_success());
        match response.into_result() {
            Err(AmiError::CommandFailed { message }) => {
                assert_eq!(message, "Database entry not found")
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_into_result_unknown_status() {
        let response = AmiResponse::new(
            headers(&[("Response", "Pong"), ("ActionID", "4")]),
            Vec::new(),
        );
        match response.into_result() {
            Err(AmiError::UnexpectedResponse { status }) => assert_eq!(status, "Pong"),
            other => panic!("expected UnexpectedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_event_list_start() {
        let response = AmiResponse::new(
            headers(&[
                ("Response", "Success"),
                ("EventList", "start"),
                ("Message", "Result will follow"),
            ]),
            Vec::new(),
        );
        assert!(response.starts_event_list());
        assert_eq!(response.output_text(), "");
    }
}
