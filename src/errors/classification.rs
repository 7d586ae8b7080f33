use super::types::AutopatchError;
use crate::models::OutcomeStatus;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// Whether the error ends the whole run rather than a single finding.
    pub run_fatal: bool,
}

impl AutopatchError {
    /// Classify this error by type name and by the scope it aborts.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Run-level
            AutopatchError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                run_fatal: true,
            },
            AutopatchError::MalformedReport(_) => ErrorClassification {
                error_type: "MalformedReportError",
                run_fatal: true,
            },
            AutopatchError::NoFindings => ErrorClassification {
                error_type: "NoFindingsCondition",
                run_fatal: true,
            },

            // Finding-level
            AutopatchError::PackageNotFound { .. } => ErrorClassification {
                error_type: "PackageNotFoundError",
                run_fatal: false,
            },
            AutopatchError::InvalidSpecification(_) => ErrorClassification {
                error_type: "InvalidSpecificationError",
                run_fatal: false,
            },
            AutopatchError::IntegrityMismatch { .. } => ErrorClassification {
                error_type: "IntegrityMismatchError",
                run_fatal: false,
            },
            AutopatchError::UnsupportedDigest(_) => ErrorClassification {
                error_type: "UnsupportedDigestError",
                run_fatal: false,
            },
            AutopatchError::StepFailed { .. } => ErrorClassification {
                error_type: "StepFailedError",
                run_fatal: false,
            },
            AutopatchError::ValidationFailed { .. } => ErrorClassification {
                error_type: "ValidationFailedError",
                run_fatal: false,
            },
            AutopatchError::VersionControl(_) => ErrorClassification {
                error_type: "VersionControlError",
                run_fatal: false,
            },
            AutopatchError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                run_fatal: false,
            },
            AutopatchError::Io(_) => ErrorClassification {
                error_type: "IoError",
                run_fatal: false,
            },
            AutopatchError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                run_fatal: false,
            },
            AutopatchError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                run_fatal: false,
            },
            AutopatchError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                run_fatal: false,
            },
        }
    }

    /// Outcome status recorded when this error ends a finding's remediation.
    pub fn outcome_status(&self) -> OutcomeStatus {
        match self {
            AutopatchError::PackageNotFound { .. }
            | AutopatchError::InvalidSpecification(_)
            | AutopatchError::Yaml(_) => OutcomeStatus::FailedResolve,
            AutopatchError::IntegrityMismatch { .. } | AutopatchError::UnsupportedDigest(_) => {
                OutcomeStatus::FailedIntegrity
            }
            AutopatchError::VersionControl(_) => OutcomeStatus::FailedVersionControl,
            _ => OutcomeStatus::FailedExecution,
        }
    }

    /// Process exit code for errors that abort the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            AutopatchError::MalformedReport(_) | AutopatchError::NoFindings => 2,
            AutopatchError::Config(_) => 3,
            _ => 1,
        }
    }
}
