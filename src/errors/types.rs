use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutopatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("No vulnerabilities found")]
    NoFindings,

    #[error("Approved package not found for {package}-{version}")]
    PackageNotFound { package: String, version: String },

    #[error("Invalid package specification: {0}")]
    InvalidSpecification(String),

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", artifact.display())]
    IntegrityMismatch {
        artifact: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigest(String),

    #[error("Step '{step}' failed: {command} ({detail})")]
    StepFailed {
        step: String,
        command: String,
        detail: String,
    },

    #[error("Validation '{step}' failed: {command} ({detail})")]
    ValidationFailed {
        step: String,
        command: String,
        detail: String,
    },

    #[error("Version control error: {0}")]
    VersionControl(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
