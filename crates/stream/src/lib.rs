//! Event stream client for publish attempts.
//!
//! Opens one persistent server-push connection per attempt, decodes each
//! text frame into a typed [`ServerEvent`](skypress_protocol::ServerEvent),
//! and delivers events in arrival order on a channel. Malformed frames are
//! dropped and logged here; nothing downstream ever sees them. Teardown is
//! cancellation-driven: cancelling the token handed to
//! [`StreamClient::connect`] closes the connection and ends the channel.

pub mod client;
pub(crate) mod pump;

pub use client::{ConnectionState, StreamClient, StreamError, StreamSubscription};
