//! Stage and attempt status enums.

use serde::{Deserialize, Serialize};
use skypress_protocol::WireStatus;
use std::fmt;

/// The status of a single pipeline stage within one attempt.
///
/// Statuses form a lattice: `Pending < Active < {Succeeded, Failed,
/// Skipped}`. A stage never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    /// Whether the stage has reached a final status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Active)
    }

    /// Position in the progression lattice. Terminal statuses share the
    /// top rank; none of them can be rewritten into another.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Succeeded | Self::Failed | Self::Skipped => 2,
        }
    }
}

impl From<WireStatus> for StageStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Active => Self::Active,
            WireStatus::Succeeded => Self::Succeeded,
            WireStatus::Failed => Self::Failed,
            WireStatus::Skipped => Self::Skipped,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// The status of the publish attempt as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// No attempt has been started.
    Idle,
    /// An attempt is in flight.
    Running,
    /// Every stage finished successfully.
    Succeeded,
    /// A stage failed, or the stream dropped before a terminal event.
    Failed,
    /// The attempt was cancelled or superseded by a newer one.
    Cancelled,
}

impl OverallStatus {
    /// Whether the attempt has reached a final outcome.
    ///
    /// `Idle` is not terminal; it is the state before any attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}
