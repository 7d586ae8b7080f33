use git2::{build::CheckoutBuilder, BranchType, Commit, Oid, Repository, Signature, StatusOptions};
use std::fs;
use std::path::{Path, PathBuf};
use crate::errors::AutopatchError;
use crate::models::PackageSpecification;
use tracing::{info, warn};

/// Branch that carries the remediation for `identifier`.
pub fn branch_name(identifier: &str) -> String {
    format!("autopatch-{}", identifier.to_lowercase())
}

/// Glob matching installed copies of `package` with the artifact's extension.
pub fn artifact_pattern(package: &str, artifact: &Path) -> String {
    let package = glob::Pattern::escape(package);
    match artifact.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}*.{}", package, glob::Pattern::escape(ext)),
        None => format!("{}*", package),
    }
}

/// Result of a recorded remediation commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedChange {
    pub branch: String,
    pub commit: String,
    /// Paths removed from the library directory, relative to the checkout.
    pub removed: Vec<PathBuf>,
    pub added: PathBuf,
}

enum OriginalHead {
    Branch(String),
    Detached(Oid),
}

impl OriginalHead {
    fn capture(repo: &Repository) -> Result<(Self, Oid), AutopatchError> {
        let head = repo.head()
            .map_err(|e| AutopatchError::VersionControl(format!("No HEAD: {}", e)))?;
        let oid = head.peel_to_commit()
            .map_err(|e| AutopatchError::VersionControl(format!("HEAD not a commit: {}", e)))?
            .id();
        let original = match head.name() {
            Some(name) if head.is_branch() => OriginalHead::Branch(name.to_string()),
            _ => OriginalHead::Detached(oid),
        };
        Ok((original, oid))
    }

    /// Force the checkout back to the captured HEAD, discarding composer edits.
    fn restore(&self, repo: &Repository, commit: Oid) -> Result<(), AutopatchError> {
        let target = repo.find_commit(commit)
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to find base commit: {}", e)))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_tree(target.as_object(), Some(&mut checkout))
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to restore checkout: {}", e)))?;
        let switched = match self {
            OriginalHead::Branch(name) => repo.set_head(name),
            OriginalHead::Detached(oid) => repo.set_head_detached(*oid),
        };
        switched.map_err(|e| AutopatchError::VersionControl(format!("Failed to restore HEAD: {}", e)))
    }
}

/// Records a replacement artifact as a single commit on its own branch.
///
/// The checkout is switched back to its original HEAD afterwards, so every
/// composition starts from the same base. Callers must hold the checkout's
/// lease; branch creation races on the shared repository state.
#[derive(Debug, Clone)]
pub struct ChangeComposer {
    project_dir: PathBuf,
    lib_dir: PathBuf,
}

impl ChangeComposer {
    /// `lib_dir` is relative to the project checkout.
    pub fn new(project_dir: impl Into<PathBuf>, lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            lib_dir: lib_dir.into(),
        }
    }

    pub fn compose(
        &self,
        spec: &PackageSpecification,
        identifier: &str,
    ) -> Result<ComposedChange, AutopatchError> {
        let repo = Repository::open(&self.project_dir)
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to open repo: {}", e)))?;

        ensure_clean(&repo)?;
        let (original, base_oid) = OriginalHead::capture(&repo)?;

        let branch = branch_name(identifier);
        if repo.find_branch(&branch, BranchType::Local).is_ok() {
            return Err(AutopatchError::VersionControl(format!("Branch {} already exists", branch)));
        }

        // Nothing is touched until every file the commit would replace is tracked
        let workdir = working_tree(&repo)?;
        let lib_dir = workdir.join(&self.lib_dir);
        let pattern = glob::Pattern::new(&artifact_pattern(&spec.package, &spec.artifact_path))
            .map_err(|e| AutopatchError::VersionControl(format!("Invalid artifact pattern: {}", e)))?;
        let targets = matching_artifacts(&lib_dir, &pattern)?;
        ensure_tracked(&repo, &workdir, &targets, &lib_dir, spec)?;

        {
            let base = repo.find_commit(base_oid)
                .map_err(|e| AutopatchError::VersionControl(format!("Failed to find HEAD commit: {}", e)))?;
            repo.branch(&branch, &base, false)
                .map_err(|e| AutopatchError::VersionControl(format!("Failed to create branch {}: {}", branch, e)))?;
        }

        let result = repo
            .set_head(&format!("refs/heads/{}", branch))
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to switch to {}: {}", branch, e)))
            .and_then(|_| {
                repo.find_commit(base_oid)
                    .map_err(|e| AutopatchError::VersionControl(format!("Failed to find HEAD commit: {}", e)))
            })
            .and_then(|base| self.replace_and_commit(&repo, spec, identifier, &base, &workdir, &lib_dir, targets));
        let restored = original.restore(&repo, base_oid);

        match (result, restored) {
            (Ok((commit, removed, added)), Ok(())) => {
                info!(
                    branch = %branch,
                    commit = %commit,
                    removed = removed.len(),
                    identifier,
                    "Remediation committed"
                );
                Ok(ComposedChange {
                    branch,
                    commit: commit.to_string(),
                    removed,
                    added,
                })
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                match restored {
                    Ok(()) => discard_branch(&repo, &branch),
                    Err(restore_err) => {
                        warn!(error = %restore_err, "Checkout could not be restored after failed composition");
                    }
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn replace_and_commit(
        &self,
        repo: &Repository,
        spec: &PackageSpecification,
        identifier: &str,
        base: &Commit<'_>,
        workdir: &Path,
        lib_dir: &Path,
        targets: Vec<PathBuf>,
    ) -> Result<(Oid, Vec<PathBuf>, PathBuf), AutopatchError> {
        let io_err = |context: &str, e: std::io::Error| {
            AutopatchError::VersionControl(format!("{}: {}", context, e))
        };

        fs::create_dir_all(lib_dir).map_err(|e| io_err("Failed to create library directory", e))?;

        let mut index = repo.index()
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to get index: {}", e)))?;

        let mut removed = Vec::new();
        for path in targets {
            fs::remove_file(&path).map_err(|e| io_err("Failed to remove artifact", e))?;
            let rel = relative_to(&path, workdir)?;
            index.remove_path(&rel)
                .map_err(|e| AutopatchError::VersionControl(format!("Failed to unstage {}: {}", rel.display(), e)))?;
            removed.push(rel);
        }

        let file_name = spec.artifact_path.file_name()
            .ok_or_else(|| AutopatchError::VersionControl("Artifact has no file name".into()))?;
        let dest = lib_dir.join(file_name);
        fs::copy(&spec.artifact_path, &dest).map_err(|e| io_err("Failed to copy artifact", e))?;
        let added = relative_to(&dest, workdir)?;
        index.add_path(&added)
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to stage {}: {}", added.display(), e)))?;

        index.write()
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to write index: {}", e)))?;
        let tree_oid = index.write_tree()
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to write tree: {}", e)))?;
        if tree_oid == base.tree_id() {
            return Err(AutopatchError::VersionControl(format!(
                "Replacement {} is already in place; nothing to commit",
                added.display()
            )));
        }
        let tree = repo.find_tree(tree_oid)
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to find tree: {}", e)))?;

        let sig = repo.signature()
            .or_else(|_| Signature::now("autopatch", "autopatch@localhost"))
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to build signature: {}", e)))?;

        let message = format!("AUTO-PATCH: {}", identifier);
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[base])
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to commit: {}", e)))?;

        Ok((oid, removed, added))
    }
}

fn working_tree(repo: &Repository) -> Result<PathBuf, AutopatchError> {
    repo.workdir()
        .ok_or_else(|| AutopatchError::VersionControl("Repository has no working tree".into()))?
        .canonicalize()
        .map_err(|e| AutopatchError::VersionControl(format!("Failed to resolve working tree: {}", e)))
}

/// Regular files directly under `lib_dir` whose names match `pattern`.
/// A missing library directory has no matches.
fn matching_artifacts(lib_dir: &Path, pattern: &glob::Pattern) -> Result<Vec<PathBuf>, AutopatchError> {
    if !lib_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(lib_dir)
        .map_err(|e| AutopatchError::VersionControl(format!("Failed to list library directory: {}", e)))?;
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| AutopatchError::VersionControl(format!("Failed to read library entry: {}", e)))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && pattern.matches(&entry.file_name().to_string_lossy()) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

/// Refuse to replace files git does not track; a forced restore could not
/// bring them back.
fn ensure_tracked(
    repo: &Repository,
    workdir: &Path,
    targets: &[PathBuf],
    lib_dir: &Path,
    spec: &PackageSpecification,
) -> Result<(), AutopatchError> {
    let index = repo.index()
        .map_err(|e| AutopatchError::VersionControl(format!("Failed to get index: {}", e)))?;

    let dest = spec.artifact_path.file_name().map(|name| lib_dir.join(name));
    let existing_dest = dest.filter(|d| d.exists() && !targets.contains(d));

    for path in targets.iter().chain(existing_dest.iter()) {
        let rel = relative_to(path, workdir)?;
        if index.get_path(&rel, 0).is_none() {
            return Err(AutopatchError::VersionControl(format!(
                "Untracked file {} would be replaced; commit or remove it first",
                rel.display()
            )));
        }
    }
    Ok(())
}

fn discard_branch(repo: &Repository, branch: &str) {
    let deleted = repo
        .find_branch(branch, BranchType::Local)
        .and_then(|mut b| b.delete());
    if let Err(e) = deleted {
        warn!(branch, error = %e, "Failed to delete branch after failed composition");
    }
}

fn ensure_clean(repo: &Repository) -> Result<(), AutopatchError> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))
        .map_err(|e| AutopatchError::VersionControl(format!("Failed to read status: {}", e)))?;
    if !statuses.is_empty() {
        return Err(AutopatchError::VersionControl(format!(
            "Working tree has {} uncommitted change(s)",
            statuses.len()
        )));
    }
    Ok(())
}

fn relative_to(path: &Path, workdir: &Path) -> Result<PathBuf, AutopatchError> {
    path.strip_prefix(workdir)
        .map(Path::to_path_buf)
        .map_err(|_| AutopatchError::VersionControl(format!(
            "{} is outside the working tree",
            path.display()
        )))
}
