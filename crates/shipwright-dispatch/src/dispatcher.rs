//! 並列ビルドディスパッチャ
//!
//! 固定数のワーカーが [`ClaimCursor`] から順番にインデックスを取り、
//! [`JobQueue`] が `None` を返すまでジョブを処理し続ける。
//! 1ジョブの失敗は他のジョブを止めず、全ジョブ終了後にまとめて報告する。

use crate::error::{DispatchError, JobFailure, Result};
use crate::queue::{ClaimCursor, JobQueue};
use crate::tracker::TempResourceTracker;
use anyhow::Context;
use futures_util::FutureExt;
use shipwright_core::{BuildJob, BuildRequest, ContextRenderer, ImageBuilder};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

pub use shipwright_core::SCRATCH_PREFIX;

/// ディスパッチ完了時の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub workers: usize,
}

pub struct Dispatcher {
    builder: Arc<dyn ImageBuilder>,
    renderer: Arc<dyn ContextRenderer>,
    parallelism: usize,
    scratch_root: PathBuf,
    tracker: Arc<TempResourceTracker>,
    handle_interrupts: bool,
}

impl Dispatcher {
    pub fn new(builder: Arc<dyn ImageBuilder>, renderer: Arc<dyn ContextRenderer>) -> Self {
        Self {
            builder,
            renderer,
            parallelism: 1,
            scratch_root: std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()),
            tracker: Arc::new(TempResourceTracker::new()),
            handle_interrupts: true,
        }
    }

    /// 同時実行ワーカー数（1未満は1に丸める）
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// スクラッチディレクトリを作る場所
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<TempResourceTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// 割り込みリスナーを起動しない（テスト・組み込み用）
    pub fn without_interrupt_handler(mut self) -> Self {
        self.handle_interrupts = false;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn tracker(&self) -> &Arc<TempResourceTracker> {
        &self.tracker
    }

    /// キューのジョブをすべて処理する
    ///
    /// 全ワーカーの終了を待ってから、失敗があれば
    /// [`DispatchError::JobsFailed`] にまとめて返す。
    pub async fn run(&self, queue: JobQueue) -> Result<DispatchSummary> {
        let total = queue.len();
        if total == 0 {
            tracing::info!("Build queue is empty, nothing to do");
            return Ok(DispatchSummary {
                workers: self.parallelism,
                ..Default::default()
            });
        }

        if self.handle_interrupts {
            self.tracker.install_interrupt_handler();
        }

        tracing::info!(
            jobs = total,
            chains = queue.chain_count(),
            workers = self.parallelism,
            builder = self.builder.name(),
            "Dispatching image builds"
        );

        let context = Arc::new(DispatchContext {
            queue,
            cursor: ClaimCursor::new(),
            errors: ErrorLog::default(),
            succeeded: AtomicUsize::new(0),
            builder: Arc::clone(&self.builder),
            renderer: Arc::clone(&self.renderer),
            scratch_root: self.scratch_root.clone(),
            tracker: Arc::clone(&self.tracker),
        });

        let mut workers = JoinSet::new();
        for worker in 0..self.parallelism {
            let context = Arc::clone(&context);
            workers.spawn(async move { context.work(worker).await });
        }

        let mut aborted_workers = 0;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                aborted_workers += 1;
                tracing::error!(error = %e, "Build worker aborted");
            }
        }

        let failures = context.errors.take();
        let summary = DispatchSummary {
            total,
            succeeded: context.succeeded.load(Ordering::SeqCst),
            workers: self.parallelism,
        };

        if failures.is_empty() && aborted_workers == 0 {
            tracing::info!(succeeded = summary.succeeded, "All image builds finished");
            Ok(summary)
        } else {
            Err(DispatchError::JobsFailed {
                failures,
                aborted_workers,
            })
        }
    }
}

/// 1回の `run` の間だけ共有される状態
struct DispatchContext {
    queue: JobQueue,
    cursor: ClaimCursor,
    errors: ErrorLog,
    succeeded: AtomicUsize,
    builder: Arc<dyn ImageBuilder>,
    renderer: Arc<dyn ContextRenderer>,
    scratch_root: PathBuf,
    tracker: Arc<TempResourceTracker>,
}

impl DispatchContext {
    async fn work(&self, worker: usize) {
        loop {
            let index = self.cursor.claim();
            let Some(job) = self.queue.get(index) else {
                tracing::debug!(worker, "No more queued builds, worker exiting");
                break;
            };

            tracing::info!(
                worker,
                index,
                chain = %job.chain_name(),
                version = %job.version,
                "Starting image build"
            );

            // panic もジョブ単位の失敗として扱い、ワーカーは次のジョブへ進む
            let outcome = AssertUnwindSafe(self.build(job))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow::anyhow!("build panicked: {}", panic_message(&*panic)))
                });

            match outcome {
                Ok(()) => {
                    self.succeeded.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(
                        worker,
                        chain = %job.chain_name(),
                        version = %job.version,
                        "Image build succeeded"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        worker,
                        chain = %job.chain_name(),
                        version = %job.version,
                        error = %format!("{:#}", error),
                        "Image build failed"
                    );
                    self.errors.push(JobFailure::new(job, error));
                }
            }
        }
    }

    async fn build(&self, job: &BuildJob) -> anyhow::Result<()> {
        let scratch = ScratchDir::allocate(&self.tracker, &self.scratch_root)
            .context("error making temporary directory for dockerfile")?;

        let rendered = self
            .renderer
            .render(job, scratch.path())
            .await
            .context("error rendering build context")?;

        let request = BuildRequest::new(job, rendered, scratch.path().to_path_buf());
        tracing::debug!(
            chain = %request.chain,
            tags = ?request.tags,
            context = %request.context_root().display(),
            "Rendered build context"
        );

        self.builder.build(&request).await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// ジョブ専用のスクラッチディレクトリ
///
/// 作成直後にトラッカーへ登録し、drop 時（成功・失敗・panic）に削除と登録解除を行う。
struct ScratchDir {
    path: PathBuf,
    tracker: Arc<TempResourceTracker>,
}

impl ScratchDir {
    fn allocate(tracker: &Arc<TempResourceTracker>, root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let path = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?
            .keep();
        tracker.register(&path);

        Ok(Self {
            path,
            tracker: Arc::clone(tracker),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.tracker.release(&self.path);
    }
}

#[derive(Default)]
struct ErrorLog {
    failures: Mutex<Vec<JobFailure>>,
}

impl ErrorLog {
    fn push(&self, failure: JobFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    fn take(&self) -> Vec<JobFailure> {
        std::mem::take(
            &mut *self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
