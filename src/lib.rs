//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for Asterisk's Manager Interface,
//! allowing applications to log in to an Asterisk PBX, send actions such as
//! `Originate`, `Command` or `DBGet`, and receive events.
//!
//! # Architecture
//!
//! The library uses a split reader/writer design:
//! - [`AmiClient`] (Clone + Send) sends actions from any task and matches
//!   each response to its action by `ActionID`
//! - [`AmiEventStream`] receives events from a background reader task
//! - [`EventDispatcher`] optionally routes those events to callbacks
//!
//! # Examples
//!
//! ## Login and run a CLI command
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let (client, _events) = AmiClient::connect("localhost", 5038, "admin", "secret").await?;
//!
//!     let response = client.command("core show channels").await?;
//!     println!("{}", response.output_text());
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Watching channel state
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiEventType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (_client, mut events) = AmiClient::connect("localhost", 5038, "admin", "secret").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Some(state) = event.new_state() {
//!             println!("{:?} is now {:?}", state.channel, state.state);
//!         } else if event.is_event_type(AmiEventType::Hangup) {
//!             println!("{:?} hung up", event.channel());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod channel;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event;

pub(crate) mod buffer;
pub(crate) mod constants;
pub(crate) mod protocol;

mod action;

pub use action::{AmiAction, AmiResponse, ResponseCompletion, ResponseStatus};
pub use actions::{
    Challenge, Command, CoreSettings, CoreShowChannels, DbDel, DbDelTree, DbGet, DbPut, EventMask,
    Events, Getvar, Hangup, Login, Logoff, Originate, OriginateError, Ping, Redirect, Setvar,
};
pub use channel::{ChannelState, HangupCause, HangupInfo, NewState};
pub use connection::{
    AmiClient, AmiConnectOptions, AmiEventStream, AuthMethod, ConnectionStatus, DisconnectReason,
};
pub use constants::{DEFAULT_AMI_PORT, DND_FAMILY, DND_VALUE};
pub use dispatcher::{EventDispatcher, EventHandler};
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, AmiEventType};
