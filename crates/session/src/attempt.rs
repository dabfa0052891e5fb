//! Attempt identity and supersession.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Opaque identity for one publish attempt.
///
/// Minted from a process-local monotonic counter, so two attempts can
/// never compare equal and an id cannot be reconstructed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one publish attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: AttemptId,
    /// Correlation id the server echoes on every frame of this attempt.
    pub local_id: String,
    /// Cancelled when the attempt is superseded or explicitly cancelled.
    pub cancel: CancellationToken,
}

/// Mints attempt identities and guarantees at most one is current.
#[derive(Debug, Default)]
pub struct AttemptSource {
    next: AtomicU64,
    current: Mutex<Option<(AttemptId, CancellationToken)>>,
}

impl AttemptSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new attempt.
    ///
    /// The previous attempt's token is cancelled while the current-attempt
    /// slot is still locked, so there is no window in which two attempts
    /// are both current.
    pub fn begin(&self) -> Attempt {
        let id = AttemptId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();

        if let Ok(mut current) = self.current.lock()
            && let Some((prev_id, prev_cancel)) = current.replace((id, cancel.clone()))
        {
            debug!(superseded = %prev_id, by = %id, "cancelling previous attempt");
            prev_cancel.cancel();
        }

        Attempt {
            id,
            local_id: Uuid::new_v4().to_string(),
            cancel,
        }
    }

    /// True only for the most recently begun attempt.
    pub fn is_current(&self, id: AttemptId) -> bool {
        self.current
            .lock()
            .map(|current| current.as_ref().is_some_and(|(cur, _)| *cur == id))
            .unwrap_or(false)
    }

    /// Cancels the current attempt's token, if any.
    ///
    /// Returns `false` when no attempt has been begun. Cancelling an
    /// already-cancelled attempt is a no-op.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock() {
            Ok(current) => match current.as_ref() {
                Some((_, cancel)) => {
                    cancel.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
