//! Deployment stage identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One named unit of work in the publish pipeline.
///
/// Declaration order is pipeline order: a stage may only start once every
/// stage before it has finished. The wire names are the kebab-case forms
/// (`capability-check`, `create-deployment`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    CapabilityCheck,
    CreateDeployment,
    SetEnvVars,
    CreateBundle,
    UploadBundle,
    DeployBundle,
    RestoreEnvironment,
    RunContent,
    Validate,
    WrapUp,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [StageId; 10] = [
        StageId::CapabilityCheck,
        StageId::CreateDeployment,
        StageId::SetEnvVars,
        StageId::CreateBundle,
        StageId::UploadBundle,
        StageId::DeployBundle,
        StageId::RestoreEnvironment,
        StageId::RunContent,
        StageId::Validate,
        StageId::WrapUp,
    ];

    /// Number of stages in the pipeline.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this stage in pipeline order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The stage's wire name.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::CapabilityCheck => "capability-check",
            Self::CreateDeployment => "create-deployment",
            Self::SetEnvVars => "set-env-vars",
            Self::CreateBundle => "create-bundle",
            Self::UploadBundle => "upload-bundle",
            Self::DeployBundle => "deploy-bundle",
            Self::RestoreEnvironment => "restore-environment",
            Self::RunContent => "run-content",
            Self::Validate => "validate",
            Self::WrapUp => "wrap-up",
        }
    }

    /// Human-readable label for progress display.
    pub fn label(self) -> &'static str {
        match self {
            Self::CapabilityCheck => "Checking server capabilities",
            Self::CreateDeployment => "Creating deployment record",
            Self::SetEnvVars => "Setting environment variables",
            Self::CreateBundle => "Preparing content bundle",
            Self::UploadBundle => "Uploading content bundle",
            Self::DeployBundle => "Activating uploaded bundle",
            Self::RestoreEnvironment => "Restoring server environment",
            Self::RunContent => "Launching content",
            Self::Validate => "Validating deployment",
            Self::WrapUp => "Wrapping up",
        }
    }

    /// The stage that runs after this one, if any.
    pub fn next(self) -> Option<StageId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Whether this is the last stage of the pipeline.
    pub fn is_last(self) -> bool {
        self.index() == Self::COUNT - 1
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for StageId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.wire_name() == s)
            .ok_or(())
    }
}
