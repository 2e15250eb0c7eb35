//! # coedit Protocol
//!
//! Wire message definitions for coedit editing sessions.
//!
//! ## Messages
//!
//! - Client to server: `join`, `operation`, `cursor`
//! - Server to client: `joined`, `ack`, `operation`, `user_joined`,
//!   `user_left`, `cursor`, `error`
//!
//! Messages travel as JSON, one message per line, over a persistent
//! connection. The transport drops malformed lines; a decode failure is
//! never an engine error.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod messages;

pub use messages::{ClientMessage, CursorState, MessageError, ServerMessage, UserInfo};
