//! Read buffer for AMI framing

use crate::{
    constants::*,
    error::{AmiError, AmiResult},
};
use bytes::{BufMut, BytesMut};

/// Byte buffer the parser accumulates socket reads into.
///
/// Consumed bytes are tracked by `position` and reclaimed by [`compact`](Self::compact).
pub struct AmiBuffer {
    buffer: BytesMut,
    position: usize,
}

impl AmiBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(BUF_CHUNK),
            position: 0,
        }
    }

    /// Unconsumed bytes
    pub fn len(&self) -> usize {
        self.buffer
            .len()
            - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if self
            .buffer
            .remaining_mut()
            < data.len()
        {
            let old_cap = self
                .buffer
                .capacity();
            self.buffer
                .reserve(data.len().max(BUF_CHUNK));
            tracing::trace!(
                "Buffer grew from {} to {} bytes",
                old_cap,
                self.buffer
                    .capacity()
            );
        }
        self.buffer
            .extend_from_slice(data);
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer[self.position..]
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data()
            .starts_with(prefix)
    }

    /// Consume bytes from the front of buffer.
    ///
    /// Returns `Err` if `count` exceeds the available data.
    pub fn advance(&mut self, count: usize) -> AmiResult<()> {
        let available = self.len();
        if count > available {
            return Err(AmiError::protocol_error(format!(
                "cannot advance {} bytes, only {} available",
                count, available
            )));
        }
        self.position += count;
        Ok(())
    }

    /// Position of `pattern` relative to the unconsumed data
    pub fn find_pattern(&self, pattern: &[u8]) -> Option<usize> {
        let data = self.data();
        if pattern.is_empty() || data.len() < pattern.len() {
            return None;
        }

        data.windows(pattern.len())
            .position(|window| window == pattern)
    }

    /// Extract data up to (but not including) the pattern, consuming the pattern too.
    pub fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        let pos = self.find_pattern(pattern)?;
        let result = self.data()[..pos].to_vec();
        // find_pattern guarantees pos + pattern.len() <= len()
        let _ = self.advance(pos + pattern.len());
        Some(result)
    }

    /// Drop consumed bytes and move the remainder to the front.
    pub fn compact(&mut self) {
        if self.position == 0 {
            return;
        }
        let remaining_len = self.len();
        if remaining_len > 0 {
            self.buffer
                .copy_within(self.position.., 0);
        }
        self.buffer
            .truncate(remaining_len);
        self.position = 0;

        if self
            .buffer
            .capacity()
            < BUF_CHUNK
        {
            self.buffer
                .reserve(BUF_CHUNK);
        }
    }

    pub fn check_size_limits(&self) -> AmiResult<()> {
        let size = self
            .buffer
            .len();
        if size > MAX_BUFFER_SIZE {
            tracing::error!(
                "Buffer overflow: {} bytes accumulated (limit {}). Protocol desync?",
                size,
                MAX_BUFFER_SIZE
            );
            return Err(AmiError::BufferOverflow {
                size,
                limit: MAX_BUFFER_SIZE,
            });
        }
        Ok(())
    }
}

impl Default for AmiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_and_len() {
        let mut buffer = AmiBuffer::new();
        assert!(buffer.is_empty());

        buffer.extend_from_slice(b"Action: Ping\r\n");
        assert_eq!(buffer.len(), 14);
        assert_eq!(buffer.data(), b"Action: Ping\r\n");
    }

    #[test]
    fn test_advance_overflow() {
        let mut buffer = AmiBuffer::new();
        buffer.extend_from_slice(b"Hello");
        assert!(buffer
            .advance(10)
            .is_err());
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_extract_until_message_terminator() {
        let mut buffer = AmiBuffer::new();
        buffer.extend_from_slice(b"Response: Success\r\nPing: Pong\r\n\r\nEvent: FullyBooted");

        let block = buffer
            .extract_until_pattern(b"\r\n\r\n")
            .unwrap();
        assert_eq!(block, b"Response: Success\r\nPing: Pong");
        assert_eq!(buffer.data(), b"Event: FullyBooted");
        assert!(buffer
            .extract_until_pattern(b"\r\n\r\n")
            .is_none());
    }

    #[test]
    fn test_find_pattern_at_start() {
        let mut buffer = AmiBuffer::new();
        buffer.extend_from_slice(b"\r\n\r\nrest");
        assert_eq!(buffer.find_pattern(b"\r\n\r\n"), Some(0));
        assert_eq!(buffer.find_pattern(b""), None);
    }

    #[test]
    fn test_advance_and_compact() {
        let mut buffer = AmiBuffer::new();
        buffer.extend_from_slice(b"Asterisk Call Manager/5.0.1\r\n");

        assert!(buffer
            .advance(100)
            .is_err());
        buffer
            .advance(8)
            .unwrap();

        buffer.compact();
        assert_eq!(buffer.data(), b" Call Manager/5.0.1\r\n");
        assert!(buffer.starts_with(b" Call"));
    }

    #[test]
    fn test_size_limit() {
        let mut buffer = AmiBuffer::new();
        buffer.extend_from_slice(&vec![b'x'; MAX_BUFFER_SIZE]);
        assert!(buffer
            .check_size_limits()
            .is_ok());

        buffer.extend_from_slice(b"x");
        match buffer.check_size_limits() {
            Err(AmiError::BufferOverflow { size, limit }) => {
                assert_eq!(size, MAX_BUFFER_SIZE + 1);
                assert_eq!(limit, MAX_BUFFER_SIZE);
            }
            other => panic!("expected BufferOverflow, got {:?}", other),
        }
    }
}
