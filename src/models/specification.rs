use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One remediation or validation command as declared in `AGENT.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellStep {
    pub name: String,
    /// Command template; may reference `{{ playbook_dir }}`.
    pub command: String,
}

/// A step ready to hand to a `CommandRunner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub name: String,
    pub command_line: String,
    pub working_dir: PathBuf,
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*playbook_dir\s*\}\}").expect("static regex"))
}

impl ShellStep {
    /// Substitute the package directory placeholder and bind a working directory.
    pub fn resolve(&self, package_dir: &Path, working_dir: &Path) -> ResolvedStep {
        let dir = package_dir.to_string_lossy();
        let command_line = placeholder()
            .replace_all(&self.command, regex::NoExpand(&dir))
            .into_owned();
        ResolvedStep {
            name: self.name.clone(),
            command_line,
            working_dir: working_dir.to_path_buf(),
        }
    }
}

/// Declarative patch specification for one approved package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpecification {
    pub package: String,
    pub version: String,
    pub artifact_path: PathBuf,
    /// Declared digest, `algo:hex` or bare hex.
    pub expected_digest: String,
    pub steps: Vec<ShellStep>,
    pub validations: Vec<ShellStep>,
}

/// On-disk shape of `AGENT.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDocument {
    pub checksum: String,
    /// Artifact file name relative to the package directory.
    pub artifact: Option<String>,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
    #[serde(default)]
    pub validate: Vec<AgentStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentStep {
    pub name: Option<String>,
    pub shell: String,
}

impl AgentStep {
    pub fn into_shell_step(self, fallback_name: String) -> ShellStep {
        ShellStep {
            name: self.name.filter(|n| !n.trim().is_empty()).unwrap_or(fallback_name),
            command: self.shell,
        }
    }
}
