//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from TCP stream (64KB)
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
pub const BUF_CHUNK: usize = 64 * 1024;

/// Maximum single message size (8MB)
/// `core show channels verbose` on a busy box is the largest thing we expect.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Maximum total buffer size (16MB) - safety limit to prevent runaway memory
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Protocol terminators
pub const LINE_TERMINATOR: &str = "\r\n";
pub const MESSAGE_TERMINATOR: &str = "\r\n\r\n";

/// Trailer of a legacy `Response: Follows` command reply
pub const END_COMMAND_TERMINATOR: &str = "--END COMMAND--\r\n\r\n";

/// Prefix of the banner line sent on connect
pub const BANNER_PREFIX: &str = "Asterisk Call Manager";

/// Header names
pub const HEADER_ACTION: &str = "Action";
pub const HEADER_ACTION_ID: &str = "ActionID";
pub const HEADER_RESPONSE: &str = "Response";
pub const HEADER_EVENT: &str = "Event";
pub const HEADER_MESSAGE: &str = "Message";
pub const HEADER_OUTPUT: &str = "Output";
pub const HEADER_EVENT_LIST: &str = "EventList";
pub const HEADER_PRIVILEGE: &str = "Privilege";
pub const HEADER_CHANNEL: &str = "Channel";
pub const HEADER_UNIQUE_ID: &str = "Uniqueid";
pub const HEADER_CALLER_ID_NUM: &str = "CallerIDNum";
pub const HEADER_CONNECTED_LINE_NUM: &str = "ConnectedLineNum";
pub const HEADER_CHALLENGE: &str = "Challenge";

/// `EventList` header values
pub const EVENT_LIST_START: &str = "start";
pub const EVENT_LIST_COMPLETE: &str = "Complete";

/// TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Time to wait for an action response in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// How often the reader checks the liveness deadline
pub const LIVENESS_CHECK_INTERVAL_MS: u64 = 2000;

/// Maximum number of queued events before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;

/// AstDB family and value used for the Do Not Disturb flag
pub const DND_FAMILY: &str = "DND";
pub const DND_VALUE: &str = "YES";
