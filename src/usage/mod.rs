use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use tracing::debug;

/// Scans a project tree for the vulnerable artifact's name+version signature.
#[derive(Debug, Clone)]
pub struct UsageDetector {
    root: PathBuf,
}

impl UsageDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if any entry under the root has a file name containing
    /// `"{package}-{version}"`. Symlinks are not followed and unreadable
    /// entries are skipped.
    pub fn project_uses(&self, package: &str, version: &str) -> bool {
        let signature = format!("{}-{}", package, version);
        self.find(&signature, |name| name.contains(&signature))
    }

    /// True if the tree holds `package` at any version other than `target`.
    /// Used when a report names only the approved version.
    pub fn project_uses_other_version(&self, package: &str, target: &str) -> bool {
        let signature = format!("{}-*", package);
        self.find(&signature, |name| names_other_version(name, package, target))
    }

    fn find(&self, signature: &str, matches: impl Fn(&str) -> bool) -> bool {
        let found = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .find(|entry| matches(&entry.file_name().to_string_lossy()));

        match found {
            Some(entry) => {
                debug!(signature = %signature, path = %entry.path().display(), "Vulnerable artifact present");
                true
            }
            None => false,
        }
    }
}

/// `name` contains `{package}-` followed by a version that is not `target`.
fn names_other_version(name: &str, package: &str, target: &str) -> bool {
    let prefix = format!("{}-", package);
    name.match_indices(&prefix).any(|(i, _)| {
        let rest = &name[i + prefix.len()..];
        let versioned = rest.starts_with(|c: char| c.is_ascii_digit());
        let is_target = rest
            .strip_prefix(target)
            .map(|after| !after.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(false);
        versioned && !is_target
    })
}
