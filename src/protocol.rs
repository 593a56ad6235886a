//! AMI framing and message parsing

use crate::{
    action::AmiResponse,
    buffer::AmiBuffer,
    constants::*,
    error::{AmiError, AmiResult},
    event::AmiEvent,
};
use indexmap::IndexMap;

/// AMI message kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Greeting line sent once after connect
    Banner,
    /// Reply to an action (`Response:` header)
    Response,
    /// Unsolicited or list event (`Event:` header)
    Event,
    /// Block with neither header
    Unknown,
}

impl MessageType {
    /// Classify a header block
    pub fn from_headers(headers: &IndexMap<String, String>) -> Self {
        if headers.contains_key(HEADER_RESPONSE) {
            MessageType::Response
        } else if headers.contains_key(HEADER_EVENT) {
            MessageType::Event
        } else {
            MessageType::Unknown
        }
    }
}

/// One framed AMI message
#[derive(Debug, Clone)]
pub struct AmiMessage {
    pub message_type: MessageType,
    /// Headers in wire order
    pub headers: IndexMap<String, String>,
    /// Command output lines
    pub output: Vec<String>,
    /// Banner text
    pub body: Option<String>,
}

impl AmiMessage {
    pub fn new(
        message_type: MessageType,
        headers: IndexMap<String, String>,
        output: Vec<String>,
    ) -> Self {
        Self {
            message_type,
            headers,
            output,
            body: None,
        }
    }

    fn banner(text: String) -> Self {
        Self {
            message_type: MessageType::Banner,
            headers: IndexMap::new(),
            output: Vec::new(),
            body: Some(text),
        }
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .get(name)
    }

    pub fn action_id(&self) -> Option<&String> {
        self.header(HEADER_ACTION_ID)
    }

    pub fn into_response(self) -> AmiResponse {
        AmiResponse::new(self.headers, self.output)
    }

    pub fn into_event(self) -> AmiResult<AmiEvent> {
        if self.message_type != MessageType::Event {
            return Err(AmiError::protocol_error("Message is not an event"));
        }
        AmiEvent::from_headers(self.headers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitingBanner,
    Messages,
}

/// Incremental AMI parser.
///
/// Feed socket reads with [`add_data`](Self::add_data) and drain complete
/// messages with [`parse_message`](Self::parse_message).
pub struct AmiParser {
    buffer: AmiBuffer,
    state: ParseState,
}

impl AmiParser {
    /// Parser for a fresh connection; the first line is the banner.
    pub fn new() -> Self {
        Self {
            buffer: AmiBuffer::new(),
            state: ParseState::AwaitingBanner,
        }
    }

    /// Parser that expects header blocks straight away.
    #[cfg(test)]
    pub fn without_banner() -> Self {
        Self {
            buffer: AmiBuffer::new(),
            state: ParseState::Messages,
        }
    }

    pub fn add_data(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer
            .extend_from_slice(data);
        self.buffer
            .check_size_limits()
    }

    /// Try to parse a complete message from the buffer
    pub fn parse_message(&mut self) -> AmiResult<Option<AmiMessage>> {
        match self.state {
            ParseState::AwaitingBanner => self.parse_banner(),
            ParseState::Messages => self.parse_block(),
        }
    }

    fn parse_banner(&mut self) -> AmiResult<Option<AmiMessage>> {
        loop {
            let line = match self
                .buffer
                .extract_until_pattern(LINE_TERMINATOR.as_bytes())
            {
                Some(line) => line,
                None => return self.check_pending_size(),
            };
            self.buffer
                .compact();

            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with(BANNER_PREFIX) {
                tracing::warn!("Unexpected AMI banner: {}", line);
            }

            self.state = ParseState::Messages;
            return Ok(Some(AmiMessage::banner(line.to_string())));
        }
    }

    fn parse_block(&mut self) -> AmiResult<Option<AmiMessage>> {
        while self
            .buffer
            .starts_with(LINE_TERMINATOR.as_bytes())
        {
            self.buffer
                .advance(LINE_TERMINATOR.len())?;
        }

        if self
            .buffer
            .starts_with(b"Response: Follows")
        {
            return self.parse_legacy_command();
        }

        let block = match self
            .buffer
            .extract_until_pattern(MESSAGE_TERMINATOR.as_bytes())
        {
            Some(block) => block,
            None => return self.check_pending_size(),
        };
        self.buffer
            .compact();

        // Older PBXes send Latin-1 caller names
        let text = String::from_utf8_lossy(&block);
        let (headers, output) = parse_headers(&text)?;
        let message_type = MessageType::from_headers(&headers);
        Ok(Some(AmiMessage::new(message_type, headers, output)))
    }

    /// Pre-14 `Command` replies carry raw output lines terminated by
    /// `--END COMMAND--`; the output may contain blank lines.
    fn parse_legacy_command(&mut self) -> AmiResult<Option<AmiMessage>> {
        let block = match self
            .buffer
            .extract_until_pattern(END_COMMAND_TERMINATOR.as_bytes())
        {
            Some(block) => block,
            None => return self.check_pending_size(),
        };
        self.buffer
            .compact();

        let text = String::from_utf8_lossy(&block);
        let mut headers = IndexMap::new();
        let mut output = Vec::new();
        let mut in_headers = true;

        for line in text.lines() {
            if in_headers {
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim();
                    if matches!(
                        key,
                        HEADER_RESPONSE | HEADER_PRIVILEGE | HEADER_ACTION_ID | HEADER_MESSAGE
                    ) {
                        headers.insert(key.to_string(), value.trim().to_string());
                        continue;
                    }
                }
                in_headers = false;
            }
            output.push(line.to_string());
        }

        while output
            .last()
            .is_some_and(|l| l.trim().is_empty())
        {
            output.pop();
        }

        Ok(Some(AmiMessage::new(MessageType::Response, headers, output)))
    }

    fn check_pending_size(&self) -> AmiResult<Option<AmiMessage>> {
        let pending = self
            .buffer
            .len();
        if pending > MAX_MESSAGE_SIZE {
            return Err(AmiError::BufferOverflow {
                size: pending,
                limit: MAX_MESSAGE_SIZE,
            });
        }
        Ok(None)
    }
}

impl Default for AmiParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a header block into ordered headers and `Output:` lines.
fn parse_headers(block: &str) -> AmiResult<(IndexMap<String, String>, Vec<String>)> {
    let mut headers = IndexMap::new();
    let mut output = Vec::new();

    for line in block.lines() {
        if line
            .trim()
            .is_empty()
        {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| AmiError::InvalidHeader {
                header: line.to_string(),
            })?;
        let key = key.trim();

        if key == HEADER_OUTPUT {
            let value = value
                .strip_prefix(' ')
                .unwrap_or(value);
            output.push(
                value
                    .trim_end_matches('\r')
                    .to_string(),
            );
        } else {
            headers.insert(key.to_string(), value.trim().to_string());
        }
    }

    Ok((headers, output))
}
