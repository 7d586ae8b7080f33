use std::path::{Path, PathBuf};
use crate::errors::AutopatchError;
use crate::models::{AgentDocument, PackageSpecification};
use crate::report::is_well_formed_token;
use tracing::{info, warn};

pub const SPEC_FILE_NAME: &str = "AGENT.yaml";

/// A trust-store entry located on disk, with its specification loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Absolute, canonical package directory.
    pub dir: PathBuf,
    pub spec: PackageSpecification,
}

/// Read-only view of the approved-packages directory.
#[derive(Debug, Clone)]
pub struct TrustStore {
    root: PathBuf,
}

impl TrustStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate `{package}-{version}` under the trust root and load its
    /// specification. Never fetches anything; a miss is final.
    pub fn resolve(&self, package: &str, version: &str) -> Result<ResolvedPackage, AutopatchError> {
        let not_found = || AutopatchError::PackageNotFound {
            package: package.to_string(),
            version: version.to_string(),
        };

        if !is_well_formed_token(package) || !is_well_formed_token(version) {
            return Err(not_found());
        }

        let key = format!("{}-{}", package, version);
        let candidate = self.root.join(&key);
        if !candidate.is_dir() {
            return Err(not_found());
        }

        let root = self.root.canonicalize().map_err(|_| not_found())?;
        let dir = candidate.canonicalize().map_err(|_| not_found())?;
        if !dir.starts_with(&root) {
            warn!(package, version, dir = %dir.display(), "Package directory escapes trust root");
            return Err(not_found());
        }

        let spec = load_specification(&dir, package, version)?;
        info!(package, version, dir = %dir.display(), steps = spec.steps.len(), "Resolved approved package");
        Ok(ResolvedPackage { dir, spec })
    }
}

fn load_specification(
    dir: &Path,
    package: &str,
    version: &str,
) -> Result<PackageSpecification, AutopatchError> {
    let spec_path = dir.join(SPEC_FILE_NAME);
    let content = std::fs::read_to_string(&spec_path).map_err(|e| {
        AutopatchError::InvalidSpecification(format!("cannot read {}: {}", spec_path.display(), e))
    })?;
    let doc: AgentDocument = serde_yaml::from_str(&content).map_err(|e| {
        AutopatchError::InvalidSpecification(format!("{}: {}", spec_path.display(), e))
    })?;

    if doc.checksum.trim().is_empty() {
        return Err(AutopatchError::InvalidSpecification(format!(
            "{}: empty checksum",
            spec_path.display()
        )));
    }

    let artifact_name = doc
        .artifact
        .clone()
        .unwrap_or_else(|| format!("{}-{}.jar", package, version));
    if Path::new(&artifact_name).file_name().map(|n| n.to_string_lossy() != artifact_name).unwrap_or(true) {
        return Err(AutopatchError::InvalidSpecification(format!(
            "{}: artifact must be a plain file name, got '{}'",
            spec_path.display(),
            artifact_name
        )));
    }

    let steps: Vec<_> = doc
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_shell_step(format!("step-{}", i + 1)))
        .collect();
    let validations: Vec<_> = doc
        .validate
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.into_shell_step(format!("validate-{}", i + 1)))
        .collect();

    if steps.is_empty() {
        warn!(package, version, "Specification has no steps; patch is a no-op");
    }

    Ok(PackageSpecification {
        package: package.to_string(),
        version: version.to_string(),
        artifact_path: dir.join(artifact_name),
        expected_digest: doc.checksum.trim().to_string(),
        steps,
        validations,
    })
}
