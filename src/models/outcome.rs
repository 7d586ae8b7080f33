use serde::{Serialize, Serializer};
use super::plan::RolloutPlan;

/// Terminal status of one finding's remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Applied,
    SkippedNotUsed,
    FailedResolve,
    FailedIntegrity,
    FailedExecution,
    FailedVersionControl,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::SkippedNotUsed => "skippedNotUsed",
            Self::FailedResolve => "failedResolve",
            Self::FailedIntegrity => "failedIntegrity",
            Self::FailedExecution => "failedExecution",
            Self::FailedVersionControl => "failedVersionControl",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Applied | Self::SkippedNotUsed)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the run's output.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationOutcome {
    #[serde(rename = "cve")]
    pub identifier: String,
    pub package: String,
    pub status: OutcomeStatus,
    /// Written as the ordered playbook, like the `plan` command prints it.
    #[serde(serialize_with = "serialize_playbook")]
    pub plan: Option<RolloutPlan>,
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_playbook<S: Serializer>(plan: &Option<RolloutPlan>, serializer: S) -> Result<S::Ok, S::Error> {
    plan.as_ref().map(RolloutPlan::playbook).serialize(serializer)
}
