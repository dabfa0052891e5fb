//! Publish session controller.
//!
//! The composition root of the publish core: owns the identity of the
//! current attempt, opens one event stream per attempt, folds decoded
//! events through the pipeline reducer, and fans the resulting snapshots
//! out to observers. Starting a new attempt (or dropping the session)
//! retires the previous attempt in the same synchronous step that mints
//! the new one, so a superseded attempt can never touch the new attempt's
//! snapshot.

pub mod attempt;
pub mod controller;
pub mod debounce;

pub use attempt::{Attempt, AttemptId, AttemptSource};
pub use controller::{PublishSession, SessionConfig};
pub use debounce::Debouncer;
