use shipwright_core::BuildJob;
use std::fmt;
use thiserror::Error;

/// 1ジョブ分の失敗
#[derive(Debug)]
pub struct JobFailure {
    pub chain: String,
    pub version: String,
    pub error: anyhow::Error,
}

impl JobFailure {
    pub fn new(job: &BuildJob, error: anyhow::Error) -> Self {
        Self {
            chain: job.chain.name.clone(),
            version: job.version.clone(),
            error,
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error building docker image for {} from ref: {} - {:#}",
            self.chain, self.version, self.error
        )
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// キューを最後まで処理した後の集約エラー
    #[error("{}", render_failures(.failures, .aborted_workers))]
    JobsFailed {
        failures: Vec<JobFailure>,
        aborted_workers: usize,
    },
}

impl DispatchError {
    pub fn failures(&self) -> &[JobFailure] {
        match self {
            DispatchError::JobsFailed { failures, .. } => failures,
        }
    }
}

fn render_failures(failures: &[JobFailure], aborted_workers: &usize) -> String {
    let mut message = format!("{} image build(s) failed", failures.len());
    if *aborted_workers > 0 {
        message.push_str(&format!(", {} worker(s) aborted", aborted_workers));
    }
    for failure in failures {
        message.push_str("\n  ");
        message.push_str(&failure.to_string());
    }
    message
}

pub type Result<T> = std::result::Result<T, DispatchError>;
