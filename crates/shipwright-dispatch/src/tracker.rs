//! 実行中ジョブのスクラッチディレクトリ管理
//!
//! Ctrl+C / SIGTERM を受けたら、登録中のディレクトリをすべて削除してから終了する。

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 割り込みで終了するときの終了コード
pub const INTERRUPT_EXIT_CODE: i32 = 1;

#[derive(Debug, Default)]
pub struct TempResourceTracker {
    paths: Mutex<HashSet<PathBuf>>,
    listener_installed: AtomicBool,
}

impl TempResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 登録する。既に登録済みなら false
    pub fn register(&self, path: impl Into<PathBuf>) -> bool {
        self.lock().insert(path.into())
    }

    /// 登録を外す（削除はしない）。未登録なら false
    pub fn unregister(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    /// ディレクトリを削除してから登録を外す
    ///
    /// 削除はロックの外で行い、登録解除は削除の後。登録が外れたパスは
    /// 削除済み（または削除を試みた後）であることが保証される。
    pub fn release(&self, path: &Path) {
        if let Err(e) = remove_dir(path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        }
        self.lock().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn in_flight(&self) -> Vec<PathBuf> {
        self.lock().iter().cloned().collect()
    }

    /// 登録中のディレクトリをすべて削除する（ベストエフォート）
    ///
    /// 実際に削除できたディレクトリの数を返す。
    pub fn sweep(&self) -> usize {
        let mut paths = self.lock();
        let mut removed = 0;
        for path in paths.drain() {
            if path.exists() && std::fs::remove_dir_all(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// 割り込みリスナーを起動する（トラッカーごとに1回のみ）
    ///
    /// tokio ランタイム内から呼ぶこと。起動した場合は true。
    pub fn install_interrupt_handler(self: &Arc<Self>) -> bool {
        if self.listener_installed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            interrupt_signal().await;
            let in_flight = tracker.in_flight().len();
            tracing::warn!(in_flight, "Interrupted, removing scratch directories");
            let removed = tracker.sweep();
            tracing::warn!(removed, "Cleanup finished, exiting");
            std::process::exit(INTERRUPT_EXIT_CODE);
        });
        tracing::debug!("Interrupt handler installed");
        true
    }
}

fn remove_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// SIGINT (Ctrl+C) または SIGTERM を待つ
async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_register_is_idempotent() {
        let tracker = TempResourceTracker::new();
        let path = PathBuf::from("/tmp/shipwright-test-a");

        assert!(tracker.register(&path));
        assert!(!tracker.register(&path));
        assert_eq!(tracker.in_flight().len(), 1);

        assert!(tracker.unregister(&path));
        assert!(!tracker.unregister(&path));
        assert!(tracker.in_flight().is_empty());
    }

    #[test]
    fn test_sweep_after_unregister_deletes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scratch = temp_dir.path().join("job-0");
        fs::create_dir(&scratch).unwrap();

        let tracker = TempResourceTracker::new();
        tracker.register(&scratch);
        tracker.unregister(&scratch);

        assert_eq!(tracker.sweep(), 0);
        // 登録を外しただけなので残っている
        assert!(scratch.exists());
    }

    #[test]
    fn test_sweep_deletes_registered_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scratch = temp_dir.path().join("job-1");
        let other = temp_dir.path().join("job-2");
        fs::create_dir(&scratch).unwrap();
        fs::write(scratch.join("Dockerfile"), "FROM alpine").unwrap();
        fs::create_dir(&other).unwrap();

        let tracker = TempResourceTracker::new();
        tracker.register(&scratch);

        assert_eq!(tracker.sweep(), 1);
        assert!(!scratch.exists());
        assert!(other.exists());
        assert!(tracker.in_flight().is_empty());
    }

    #[test]
    fn test_release_removes_and_unregisters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scratch = temp_dir.path().join("job-3");
        fs::create_dir(&scratch).unwrap();

        let tracker = TempResourceTracker::new();
        tracker.register(&scratch);
        tracker.release(&scratch);

        assert!(!scratch.exists());
        assert!(!tracker.contains(&scratch));
        assert_eq!(tracker.sweep(), 0);

        // 既に存在しないパスの release は何もしない
        tracker.release(&scratch);
    }

    #[test]
    fn test_release_concurrently_with_register() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempResourceTracker::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let root = temp_dir.path().to_path_buf();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let scratch = root.join(format!("job-{}-{}", i, j));
                        fs::create_dir(&scratch).unwrap();
                        fs::write(scratch.join("Dockerfile"), "FROM alpine").unwrap();
                        assert!(tracker.register(&scratch));
                        tracker.release(&scratch);
                        assert!(!scratch.exists());
                        assert!(!tracker.contains(&scratch));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(tracker.in_flight().is_empty());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_handler_installed_once() {
        let tracker = Arc::new(TempResourceTracker::new());
        assert!(tracker.install_interrupt_handler());
        assert!(!tracker.install_interrupt_handler());
    }
}
