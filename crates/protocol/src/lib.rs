//! Wire protocol types for the skypress publish event stream.
//!
//! The publish server pushes one UTF-8 text frame per stage transition.
//! This crate defines the stage identifiers, the frame envelope, and the
//! decoding step that turns raw frame text into typed [`ServerEvent`]s.

pub mod frame;
pub mod stage;

pub use frame::{DecodeError, ServerEvent, StreamFrame, WireStatus, decode_frame};
pub use stage::StageId;
