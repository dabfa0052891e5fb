//! The pure event reducer.

use skypress_protocol::ServerEvent;
use tracing::{debug, warn};

use crate::snapshot::{AttemptError, PipelineSnapshot};
use crate::status::{OverallStatus, StageStatus};

/// Folds one decoded server event into a snapshot, returning the next
/// snapshot.
///
/// Rejected events (re-delivered, reordered, or arriving after the attempt
/// reached a terminal status) leave the snapshot unchanged: the returned
/// value equals the input. Applying the same event twice is always a no-op
/// the second time.
pub fn apply_event(snapshot: &PipelineSnapshot, event: &ServerEvent) -> PipelineSnapshot {
    if snapshot.is_terminal() {
        debug!(stage = %event.stage, status = ?event.status, "event after terminal snapshot dropped");
        return snapshot.clone();
    }

    let current = snapshot.stage(event.stage);
    let target = StageStatus::from(event.status);

    // Re-delivery of an already-applied transition.
    if target == current {
        return snapshot.clone();
    }

    // Per-stage monotonicity: statuses only move up the lattice.
    if target.rank() <= current.rank() {
        warn!(
            stage = %event.stage,
            from = %current,
            to = %target,
            "out-of-order stage event dropped"
        );
        return snapshot.clone();
    }

    // Pipeline-order causality: a stage may not start while an earlier
    // stage is unfinished.
    if target == StageStatus::Active {
        let blocker = snapshot
            .stages()
            .take(event.stage.index())
            .find(|&(_, status)| !status.is_terminal());
        if let Some((earlier, status)) = blocker {
            warn!(
                stage = %event.stage,
                blocked_on = %earlier,
                blocked_on_status = %status,
                "stage activated out of pipeline order, event dropped"
            );
            return snapshot.clone();
        }
    }

    let mut next = snapshot.clone();
    next.set_stage(event.stage, target);

    match target {
        StageStatus::Failed => {
            // First hard failure ends the attempt.
            next.overall = OverallStatus::Failed;
            next.error = Some(AttemptError::Stage {
                stage: event.stage,
                message: failure_message(event),
            });
            next.skip_pending();
        }
        StageStatus::Succeeded if event.stage.is_last() => {
            next.overall = OverallStatus::Succeeded;
            next.dashboard_url = event.dashboard_url.clone();
        }
        _ => {}
    }

    next
}

fn failure_message(event: &ServerEvent) -> String {
    event
        .error
        .clone()
        .or_else(|| event.message.clone())
        .unwrap_or_else(|| format!("{} failed", event.stage.label()))
}
