//! The publish session controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skypress_pipeline::{OverallStatus, PipelineSnapshot, apply_event};
use skypress_protocol::ServerEvent;
use skypress_stream::{StreamClient, StreamError};

use crate::attempt::{Attempt, AttemptSource};

/// Session configuration.
///
/// The target identifiers come from the configuration-selection layer;
/// the session does not resolve or validate them.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket URL of the publish event stream.
    pub stream_url: String,
    /// Account the content is published under.
    pub account_id: String,
    /// Content record being published.
    pub content_id: String,
    /// Quiet period for the UI-facing debounced trigger.
    pub debounce_wait: Duration,
}

impl SessionConfig {
    pub fn new(
        stream_url: impl Into<String>,
        account_id: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Self {
        Self {
            stream_url: stream_url.into(),
            account_id: account_id.into(),
            content_id: content_id.into(),
            debounce_wait: Duration::from_millis(1000),
        }
    }
}

/// Owns the current publish attempt and fans snapshots out to observers.
///
/// At most one attempt is live at a time. Starting a new attempt retires
/// the previous one in the same synchronous step that mints the new
/// identity; late events from a retired attempt's connection are dropped
/// at the entry gate. Dropping the session cancels the live attempt.
pub struct PublishSession {
    config: SessionConfig,
    attempts: Arc<AttemptSource>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PublishSession {
    pub fn new(config: SessionConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(PipelineSnapshot::idle());
        Self {
            config,
            attempts: Arc::new(AttemptSource::new()),
            snapshot_tx,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers an observer of pipeline snapshots.
    ///
    /// The receiver holds the latest snapshot immediately; an observer
    /// registered mid-attempt does not wait for the next update.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The latest pipeline snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Starts a new publish attempt, cancelling any attempt in flight.
    ///
    /// Returns the attempt handle; its `local_id` is what the caller
    /// passes to the publish request so the server can tag this attempt's
    /// frames.
    pub fn start_publish(&self) -> Attempt {
        let attempt = self.attempts.begin();
        info!(
            attempt = %attempt.id,
            account = %self.config.account_id,
            content = %self.config.content_id,
            "starting publish"
        );

        self.snapshot_tx.send_replace(PipelineSnapshot::running());

        let ctx = AttemptContext {
            attempts: self.attempts.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
            stream_url: self.config.stream_url.clone(),
        };
        let handle = tokio::spawn(run_attempt(ctx, attempt.clone()));
        if let Ok(mut task) = self.task.lock() {
            // The previous task, if any, exits on its own cancelled token.
            *task = Some(handle);
        }

        attempt
    }

    /// Cancels the current attempt, closing its stream.
    ///
    /// The snapshot moves to `Cancelled`; stage statuses are left exactly
    /// as they were. A no-op when no attempt is running.
    pub fn cancel_publish(&self) {
        if !self.attempts.cancel_current() {
            return;
        }
        let changed = self.snapshot_tx.send_if_modified(|snapshot| {
            if snapshot.overall != OverallStatus::Running {
                return false;
            }
            *snapshot = snapshot.cancelled();
            true
        });
        if changed {
            info!("publish cancelled");
        }
    }
}

impl Drop for PublishSession {
    fn drop(&mut self) {
        self.attempts.cancel_current();
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }
}

/// Shared state handed to the attempt task.
struct AttemptContext {
    attempts: Arc<AttemptSource>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
    stream_url: String,
}

impl AttemptContext {
    /// Folds one event into the snapshot.
    ///
    /// The current-attempt check runs inside the watch closure, which
    /// serialises with the new attempt's initial `send_replace`, so a
    /// stale fold can never land on top of a newer attempt's snapshot.
    fn fold_event(&self, attempt: &Attempt, event: &ServerEvent) {
        self.snapshot_tx.send_if_modified(|snapshot| {
            if attempt.cancel.is_cancelled() || !self.attempts.is_current(attempt.id) {
                return false;
            }
            let next = apply_event(snapshot, event);
            if next == *snapshot {
                return false;
            }
            *snapshot = next;
            true
        });
    }

    /// Marks the attempt failed on connection loss, if it is still the
    /// current one and has not already finished.
    fn fail_connection(&self, attempt: &Attempt, message: &str) {
        let changed = self.snapshot_tx.send_if_modified(|snapshot| {
            if attempt.cancel.is_cancelled() || !self.attempts.is_current(attempt.id) {
                return false;
            }
            if snapshot.overall != OverallStatus::Running {
                return false;
            }
            *snapshot = snapshot.connection_lost(message);
            true
        });
        if changed {
            warn!(attempt = %attempt.id, "{message}");
        }
    }
}

/// One attempt's lifetime: open the stream, apply its events, settle the
/// terminal status.
async fn run_attempt(ctx: AttemptContext, attempt: Attempt) {
    let mut subscription =
        match StreamClient::connect(&ctx.stream_url, attempt.cancel.clone()).await {
            Ok(subscription) => subscription,
            Err(StreamError::Cancelled) => return,
            Err(e) => {
                ctx.fail_connection(&attempt, &format!("could not open event stream: {e}"));
                return;
            }
        };

    while let Some(event) = subscription.next_event().await {
        // Entry gate: events for a superseded or cancelled attempt are
        // silently dropped.
        if attempt.cancel.is_cancelled() || !ctx.attempts.is_current(attempt.id) {
            debug!(attempt = %attempt.id, "dropping event for retired attempt");
            continue;
        }
        // Frames tagged for a different attempt are not ours.
        if let Some(frame_id) = &event.local_id
            && frame_id != &attempt.local_id
        {
            debug!(
                attempt = %attempt.id,
                frame_local_id = %frame_id,
                "dropping frame for another attempt"
            );
            continue;
        }

        ctx.fold_event(&attempt, &event);

        if ctx.snapshot_tx.borrow().is_terminal() {
            debug!(attempt = %attempt.id, "attempt reached terminal status, closing stream");
            subscription.close();
            break;
        }
    }

    // The stream ended. If this attempt is still current and unfinished,
    // the connection dropped before a terminal event arrived.
    ctx.fail_connection(
        &attempt,
        "event stream closed before the deployment finished",
    );
}
