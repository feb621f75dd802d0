//! ディスパッチャと外部ビルドエンジンの境界
//!
//! ディスパッチャはジョブごとに [`ContextRenderer`] でスクラッチディレクトリへ
//! ビルドコンテキストを展開し、その結果を [`ImageBuilder`] に渡す。

use crate::job::BuildJob;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// ジョブごとのスクラッチディレクトリ名の接頭辞
///
/// ローカルビルドのコンテキストからはこの接頭辞のディレクトリを除外する。
pub const SCRATCH_PREFIX: &str = ".shipwright-";

/// レンダリング済みのビルドコンテキスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedBuild {
    /// 付与するイメージタグ（レジストリ込み）
    pub tags: Vec<String>,
    pub build_args: BTreeMap<String, String>,
    /// スクラッチディレクトリ内に書き出した Dockerfile
    pub dockerfile: PathBuf,
    /// ソースをコンテキストに含める場合のディレクトリ（ローカルビルド）
    pub source_dir: Option<PathBuf>,
}

/// Image Builder に渡す1ジョブ分のビルド要求
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub chain: String,
    pub version: String,
    /// チェーンがサポートするプラットフォーム（空なら制限なし）
    pub platforms: Vec<String>,
    pub tags: Vec<String>,
    pub build_args: BTreeMap<String, String>,
    /// ジョブ専用のスクラッチディレクトリ
    pub context_dir: PathBuf,
    pub dockerfile: PathBuf,
    pub source_dir: Option<PathBuf>,
}

impl BuildRequest {
    pub fn new(job: &BuildJob, rendered: RenderedBuild, context_dir: PathBuf) -> Self {
        Self {
            chain: job.chain.name.clone(),
            version: job.version.clone(),
            platforms: job.chain.platforms.clone(),
            tags: rendered.tags,
            build_args: rendered.build_args,
            context_dir,
            dockerfile: rendered.dockerfile,
            source_dir: rendered.source_dir,
        }
    }

    /// ビルドコンテキストとして送るディレクトリ
    pub fn context_root(&self) -> &Path {
        self.source_dir.as_deref().unwrap_or(&self.context_dir)
    }
}

/// ジョブのビルドコンテキストをスクラッチディレクトリに展開する
#[async_trait]
pub trait ContextRenderer: Send + Sync {
    async fn render(&self, job: &BuildJob, scratch_dir: &Path) -> Result<RenderedBuild>;
}

/// イメージのビルド（と必要ならプッシュ）を行う外部エンジン
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// エンジン名（ログ表示用）
    fn name(&self) -> &str;

    async fn build(&self, request: &BuildRequest) -> Result<()>;
}
