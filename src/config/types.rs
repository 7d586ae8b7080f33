use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How an applied package reaches the target project.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemediationMode {
    /// Replace the artifact on a new branch and commit it.
    #[default]
    Commit,
    /// Run the specification's steps and validations against the project.
    Execute,
}

impl RemediationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Execute => "execute",
        }
    }
}

impl std::fmt::Display for RemediationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RemediationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Self::Commit),
            "execute" => Ok(Self::Execute),
            other => Err(format!("unknown remediation mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutopatchConfig {
    /// Root of the approved-packages trust store.
    pub trust_root: PathBuf,
    /// Checkout of the project being remediated.
    pub project_dir: PathBuf,
    /// Library directory, relative to `project_dir`.
    pub lib_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub mode: RemediationMode,
    pub detect_usage: bool,
    pub critical_only: bool,
    pub step_timeout_secs: u64,
    pub notify_timeout_secs: u64,
    pub workers: usize,
    /// Maintenance window the run belongs to.
    pub window: Option<String>,
}

impl Default for AutopatchConfig {
    fn default() -> Self {
        Self {
            trust_root: PathBuf::from("approved-packages"),
            project_dir: PathBuf::from("vulnerable-app"),
            lib_dir: PathBuf::from("libs"),
            webhook_url: None,
            mode: RemediationMode::Commit,
            detect_usage: true,
            critical_only: false,
            step_timeout_secs: 300,
            notify_timeout_secs: 5,
            workers: 1,
            window: None,
        }
    }
}

impl AutopatchConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn library_dir(&self) -> PathBuf {
        self.project_dir.join(&self.lib_dir)
    }
}
