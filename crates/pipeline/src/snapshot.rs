//! The per-attempt pipeline snapshot.

use serde::Serialize;
use skypress_protocol::StageId;

use crate::status::{OverallStatus, StageStatus};

/// Terminal error payload for a failed attempt.
///
/// A stage-reported failure and a dropped connection are surfaced
/// differently so the UI can phrase them differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttemptError {
    /// A stage legitimately reported failure.
    Stage { stage: StageId, message: String },
    /// The stream closed before a terminal event arrived.
    Connection { message: String },
}

/// The full picture of one publish attempt: every stage's status in
/// pipeline order, the overall attempt status, and the terminal payload.
///
/// Snapshots are immutable values: the reducer produces a new one per
/// accepted event, and a snapshot whose overall status is terminal is
/// never modified again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    stages: [StageStatus; StageId::COUNT],
    pub overall: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
    /// Dashboard URL for the published content, available once the attempt
    /// succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

impl PipelineSnapshot {
    /// The snapshot before any attempt has been started.
    pub fn idle() -> Self {
        Self {
            stages: [StageStatus::Pending; StageId::COUNT],
            overall: OverallStatus::Idle,
            error: None,
            dashboard_url: None,
        }
    }

    /// A fresh snapshot for a newly started attempt.
    pub fn running() -> Self {
        Self {
            overall: OverallStatus::Running,
            ..Self::idle()
        }
    }

    /// The status of a single stage.
    pub fn stage(&self, id: StageId) -> StageStatus {
        self.stages[id.index()]
    }

    /// All stages with their statuses, in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, StageStatus)> + '_ {
        StageId::ALL.iter().map(|&id| (id, self.stages[id.index()]))
    }

    /// Whether the attempt has reached a final outcome.
    pub fn is_terminal(&self) -> bool {
        self.overall.is_terminal()
    }

    pub(crate) fn set_stage(&mut self, id: StageId, status: StageStatus) {
        self.stages[id.index()] = status;
    }

    /// Marks every stage still pending as skipped. Used when a hard
    /// failure ends the pipeline early.
    pub(crate) fn skip_pending(&mut self) {
        for status in &mut self.stages {
            if *status == StageStatus::Pending {
                *status = StageStatus::Skipped;
            }
        }
    }

    /// Copy of this snapshot with the attempt marked cancelled.
    ///
    /// Stage statuses are left exactly as they were: a stage that was
    /// active when the user cancelled stays active in the record, not
    /// forced to failed or skipped.
    pub fn cancelled(&self) -> Self {
        Self {
            overall: OverallStatus::Cancelled,
            ..self.clone()
        }
    }

    /// Copy of this snapshot with the attempt failed on connection loss.
    pub fn connection_lost(&self, message: impl Into<String>) -> Self {
        Self {
            overall: OverallStatus::Failed,
            error: Some(AttemptError::Connection {
                message: message.into(),
            }),
            ..self.clone()
        }
    }
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
