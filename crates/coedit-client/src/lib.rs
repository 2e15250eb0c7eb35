//! # coedit Client
//!
//! The client half of the reconciliation protocol: an editing session holds
//! the local replica, keeps at most one operation in flight, buffers edits
//! made while waiting for an ack, and rebases incoming remote operations
//! against everything the server has not yet acknowledged.
//!
//! The crate is transport-agnostic: it consumes [`coedit_proto::ServerMessage`]
//! values and produces [`coedit_proto::ClientMessage`] values for whatever
//! connection the embedding application maintains.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod presence;
pub mod session;

pub use presence::{Presence, RemoteUser};
pub use session::Session;
