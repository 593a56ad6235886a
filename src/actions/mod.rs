//! Typed builders for common manager actions.
//!
//! Each builder converts into an [`AmiAction`](crate::AmiAction) and can be
//! passed to [`AmiClient::send_action`](crate::AmiClient::send_action).

pub mod channel;
pub mod database;
pub mod originate;
pub mod system;

pub use channel::{CoreShowChannels, Getvar, Hangup, Redirect, Setvar};
pub use database::{DbDel, DbDelTree, DbGet, DbPut};
pub use originate::{Originate, OriginateError};
pub use system::{Challenge, Command, CoreSettings, EventMask, Events, Login, Logoff, Ping};
