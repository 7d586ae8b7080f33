use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One mutex per checkout path; mutations of a checkout hold its lease.
#[derive(Debug, Default)]
pub struct CheckoutLeases {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl CheckoutLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    /// Wait for exclusive use of the checkout at `path`.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(Self::key(path))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let leases = Arc::new(CheckoutLeases::new());
        let guard = leases.acquire(dir.path()).await;

        let contender = {
            let leases = leases.clone();
            let path = dir.path().to_path_buf();
            tokio::spawn(async move {
                let _guard = leases.acquire(&path).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_distinct_paths_do_not_block() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let leases = CheckoutLeases::new();
        let _ga = leases.acquire(a.path()).await;
        let gb = tokio::time::timeout(Duration::from_millis(200), leases.acquire(b.path())).await;
        assert!(gb.is_ok());
    }

    #[tokio::test]
    async fn test_equivalent_paths_share_a_lease() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        let leases = CheckoutLeases::new();
        let _guard = leases.acquire(&dir.path().join("app")).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            leases.acquire(&dir.path().join("app/../app")),
        )
        .await;
        assert!(second.is_err());
    }
}
