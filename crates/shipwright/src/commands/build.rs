use crate::releases::ReleaseLister;
use clap::Args;
use colored::Colorize;
use shipwright_build::{BuildxBuilder, DaemonBuilder, GoModFetcher, TemplateRenderer};
use shipwright_core::settings::DEFAULT_PLATFORMS;
use shipwright_core::{
    BuildJob, BuildSettings, ChainJobList, ChainNodeConfig, DockerfileType, ImageBuilder,
};
use shipwright_dispatch::{DispatchError, Dispatcher, JobQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// chains.yaml のパス（省略時はカレントディレクトリを探索）
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
    /// ビルドするチェーン（省略時は全チェーン）
    #[arg(short = 'c', long)]
    pub chain: Option<String>,
    /// github-organization を上書き
    #[arg(short = 'o', long)]
    pub org: Option<String>,
    /// github-repo を上書き
    #[arg(long)]
    pub repo: Option<String>,
    /// repo-host を上書き
    #[arg(long)]
    pub repo_host: Option<String>,
    /// ビルドする git ref（タグ・ブランチ・コミット）
    #[arg(short = 'g', long)]
    pub git_ref: Option<String>,
    /// イメージタグ（省略時は git ref から生成）
    #[arg(short = 't', long)]
    pub tag: Option<String>,
    /// latest タグも付与する
    #[arg(long)]
    pub latest: bool,
    /// チェーンごとにビルドする最新リリース数
    #[arg(short = 'n', long, default_value_t = 5)]
    pub number: usize,
    /// 並列ビルド数
    #[arg(short = 'p', long, env = "SHIPWRIGHT_PARALLEL", default_value_t = 1)]
    pub parallel: usize,
    /// プッシュ先のコンテナレジストリ
    #[arg(short = 'r', long, env = "SHIPWRIGHT_REGISTRY")]
    pub registry: Option<String>,
    /// レジストリへのプッシュをスキップ
    #[arg(short = 's', long)]
    pub skip_push: bool,
    /// カレントディレクトリのソースからビルド
    #[arg(short = 'l', long)]
    pub local: bool,
    /// -race 付きでビルド
    #[arg(long)]
    pub race: bool,
    /// docker buildx でビルド
    #[arg(short = 'b', long)]
    pub use_buildkit: bool,
    /// docker buildx のビルダー名
    #[arg(long)]
    pub buildx_builder: Option<String>,
    /// ビルドするプラットフォーム（カンマ区切り、buildx のみ）
    #[arg(long, default_value = DEFAULT_PLATFORMS)]
    pub platform: String,
    /// Docker のビルドキャッシュを使わない
    #[arg(long)]
    pub no_cache: bool,
    /// Dockerfile 内のキャッシュ無効化用タイムスタンプを埋め込む
    #[arg(long)]
    pub no_build_cache: bool,
    /// Go バージョンを上書き
    #[arg(long)]
    pub go_version: Option<String>,
    /// Alpine バージョンを上書き
    #[arg(long)]
    pub alpine_version: Option<String>,
    /// buildx の成果物を tar として書き出すパス（単一プラットフォームのみ）
    #[arg(long)]
    pub tar_export_path: Option<PathBuf>,
    /// ジョブごとのスクラッチディレクトリを作る場所
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
    /// 1イメージあたりのビルドタイムアウト（分）
    #[arg(
        long,
        env = "SHIPWRIGHT_BUILD_TIMEOUT",
        default_value_t = shipwright_core::settings::DEFAULT_BUILD_TIMEOUT_MINUTES
    )]
    pub build_timeout: u64,

    /// dockerfile を上書き (cosmos, cargo, avalanche, agoric, imported, none)
    #[arg(long)]
    pub dockerfile: Option<String>,
    /// build-target を上書き
    #[arg(long)]
    pub build_target: Option<String>,
    /// build-env を上書き（スペース区切り）
    #[arg(long)]
    pub build_env: Option<String>,
    /// build-dir を上書き
    #[arg(long)]
    pub build_dir: Option<String>,
    /// binaries を上書き（スペース区切り）
    #[arg(long)]
    pub binaries: Option<String>,
    /// libraries を上書き（スペース区切り）
    #[arg(long)]
    pub libraries: Option<String>,
    /// pre-build を上書き
    #[arg(long)]
    pub pre_build: Option<String>,
}

impl BuildArgs {
    pub fn settings(&self) -> BuildSettings {
        BuildSettings {
            registry: self.registry.clone().filter(|r| !r.is_empty()),
            skip_push: self.skip_push,
            tar_export_path: self.tar_export_path.clone(),
            use_buildkit: self.use_buildkit,
            buildx_builder: self.buildx_builder.clone(),
            platform: self.platform.clone(),
            no_cache: self.no_cache,
            no_build_cache: self.no_build_cache,
            go_version: self.go_version.clone(),
            alpine_version: self.alpine_version.clone(),
            local: self.local,
            race: self.race,
            build_timeout: Duration::from_secs(self.build_timeout * 60),
        }
    }

    /// git ref または --local 指定時は各チェーン1ジョブだけ積む
    fn single_ref(&self) -> bool {
        self.git_ref.is_some() || self.local
    }

    fn job(&self, chain: Arc<ChainNodeConfig>) -> BuildJob {
        let job = BuildJob::new(chain, self.git_ref.clone().unwrap_or_default())
            .with_latest(self.latest);
        match &self.tag {
            Some(tag) => job.with_tag(tag.clone()),
            None => job,
        }
    }

    /// チェーン定義にコマンドラインの上書きを適用する
    pub fn apply_overrides(&self, chain: &mut ChainNodeConfig) {
        if let Some(org) = non_empty(&self.org) {
            chain.github_organization = org.to_string();
        }
        if let Some(repo) = non_empty(&self.repo) {
            chain.github_repo = repo.to_string();
        }
        if let Some(host) = non_empty(&self.repo_host) {
            chain.repo_host = Some(host.to_string());
        }
        if let Some(target) = non_empty(&self.build_target) {
            chain.build_target = target.to_string();
        }
        if let Some(env) = non_empty(&self.build_env) {
            chain.build_env = split_list(env);
        }
        if let Some(binaries) = non_empty(&self.binaries) {
            chain.binaries = split_list(binaries);
        }
        if let Some(libraries) = non_empty(&self.libraries) {
            chain.libraries = split_list(libraries);
        }
    }

    /// chains.yaml にないチェーンをフラグだけで組み立てる
    pub fn ad_hoc_chain(&self) -> ChainNodeConfig {
        let mut chain = ChainNodeConfig::new(self.chain.clone().unwrap_or_default());
        self.apply_overrides(&mut chain);
        chain.dockerfile = non_empty(&self.dockerfile).map(DockerfileType::from);
        chain.build_dir = self.build_dir.clone().unwrap_or_default();
        chain.pre_build = self.pre_build.clone().unwrap_or_default();
        chain
    }

    /// 対象チェーン（上書き適用済み）
    pub fn selected_chains(&self, chains: &[ChainNodeConfig]) -> Vec<ChainNodeConfig> {
        chains
            .iter()
            .filter(|c| match non_empty(&self.chain) {
                Some(name) => c.name == name,
                None => true,
            })
            .map(|c| {
                let mut chain = c.clone();
                self.apply_overrides(&mut chain);
                chain
            })
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// ビルドキューを組み立てる
///
/// リリース一覧の取得に失敗したチェーンはスキップする。何も積まれなかった場合は
/// フラグから組み立てたチェーンを1ジョブ積む。
pub async fn build_queue(
    args: &BuildArgs,
    chains: &[ChainNodeConfig],
    lister: &ReleaseLister,
) -> JobQueue {
    let mut queue = JobQueue::new();

    for chain in args.selected_chains(chains) {
        let chain = Arc::new(chain);
        println!("Chain: {}", chain.name.cyan());

        if args.single_ref() {
            let mut jobs = ChainJobList::new();
            jobs.push(args.job(chain));
            queue.push(jobs);
            continue;
        }

        match lister.most_recent_releases(Arc::clone(&chain), args.number).await {
            Ok(jobs) => queue.push(jobs),
            Err(e) => {
                eprintln!(
                    "{} Error queueing docker image builds for chain {}: {:#}",
                    "✗".red(),
                    chain.name,
                    e
                );
                tracing::error!(chain = %chain.name, "Failed to list releases: {:#}", e);
            }
        }
    }

    if queue.is_empty() {
        let mut jobs = ChainJobList::new();
        jobs.push(args.job(Arc::new(args.ad_hoc_chain())));
        queue.push(jobs);
    }

    queue
}

pub async fn handle(args: BuildArgs) -> anyhow::Result<()> {
    let chains = super::load_chains(args.file.as_deref())?;
    let settings = Arc::new(args.settings());

    match &settings.registry {
        Some(registry) => println!("Container registry: {}", registry.cyan()),
        None => println!("Container registry: {}", "(none)".dimmed()),
    }

    let lister = ReleaseLister::new()?;
    let queue = build_queue(&args, &chains, &lister).await;

    let working_dir = std::env::current_dir()?;
    let scratch_root = args.scratch_dir.clone().unwrap_or_else(|| working_dir.clone());

    let builder: Arc<dyn ImageBuilder> = if settings.use_buildkit {
        Arc::new(BuildxBuilder::new(Arc::clone(&settings)))
    } else {
        let docker = crate::docker::init_docker_with_error_handling().await?;
        Arc::new(DaemonBuilder::new(docker, Arc::clone(&settings)))
    };
    let renderer = Arc::new(TemplateRenderer::new(
        Arc::clone(&settings),
        GoModFetcher::new()?,
        working_dir,
    ));

    let dispatcher = Dispatcher::new(builder, renderer)
        .with_parallelism(args.parallel)
        .with_scratch_root(scratch_root);

    println!(
        "{}",
        format!(
            "Building {} images with {} workers...",
            queue.len(),
            dispatcher.parallelism()
        )
        .green()
    );

    match dispatcher.run(queue).await {
        Ok(summary) => {
            println!(
                "{}",
                format!("✓ {}/{} images built", summary.succeeded, summary.total)
                    .green()
                    .bold()
            );
            Ok(())
        }
        Err(err) => {
            print_failures(&err);
            anyhow::bail!("{} image builds failed", err.failures().len())
        }
    }
}

fn print_failures(err: &DispatchError) {
    let DispatchError::JobsFailed {
        failures,
        aborted_workers,
    } = err;

    eprintln!();
    eprintln!("{}", "✗ Some images failed to build".red().bold());
    for failure in failures {
        eprintln!("  {}", failure.to_string().red());
    }
    if *aborted_workers > 0 {
        eprintln!(
            "  {}",
            format!("{} build workers aborted unexpectedly", aborted_workers).red()
        );
    }
}
