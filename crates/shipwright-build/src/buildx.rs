//! docker buildx (BuildKit) によるマルチプラットフォームビルド

use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use colored::Colorize;
use shipwright_core::{BuildRequest, BuildSettings, ImageBuilder};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

pub struct BuildxBuilder {
    settings: Arc<BuildSettings>,
}

impl BuildxBuilder {
    pub fn new(settings: Arc<BuildSettings>) -> Self {
        Self { settings }
    }

    /// 要求プラットフォームとチェーンの対応プラットフォームの共通部分
    ///
    /// チェーン側が空なら要求をそのまま使う。順序は要求側に従う。
    pub fn resolve_platforms(&self, chain: &str, supported: &[String]) -> BuildResult<String> {
        let requested = self.settings.requested_platforms();
        if supported.is_empty() {
            return Ok(requested.join(","));
        }

        let platforms: Vec<&str> = requested
            .iter()
            .copied()
            .filter(|p| supported.iter().any(|s| s == p))
            .collect();

        if platforms.is_empty() {
            return Err(BuildError::NoSupportedPlatforms {
                chain: chain.to_string(),
                requested: requested.join(","),
                supported: supported.join(","),
            });
        }

        Ok(platforms.join(","))
    }

    /// `docker` に渡す引数列（コンテキストパスが最後）
    pub fn command_args(&self, request: &BuildRequest, platforms: &str) -> BuildResult<Vec<String>> {
        let mut args = vec![
            "buildx".to_string(),
            "build".to_string(),
            "--platform".to_string(),
            platforms.to_string(),
            "-f".to_string(),
            request.dockerfile.display().to_string(),
        ];

        for tag in &request.tags {
            args.push("-t".to_string());
            args.push(tag.clone());
        }

        for (key, value) in &request.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }

        if self.settings.no_cache {
            args.push("--no-cache".to_string());
        }

        if let Some(builder) = &self.settings.buildx_builder {
            args.push("--builder".to_string());
            args.push(builder.clone());
        }

        if let Some(path) = &self.settings.tar_export_path {
            // docker 形式の tar は単一プラットフォームのみ
            if platforms.contains(',') {
                return Err(BuildError::TarExportMultiPlatform {
                    platforms: platforms.to_string(),
                });
            }
            args.push("--output".to_string());
            args.push(format!("type=docker,dest={}", path.display()));
        } else if self.settings.push() {
            args.push("--push".to_string());
        } else if !platforms.contains(',') {
            args.push("--load".to_string());
        }

        args.push(request.context_root().display().to_string());
        Ok(args)
    }

    async fn run(&self, request: &BuildRequest) -> BuildResult<()> {
        let platforms = self.resolve_platforms(&request.chain, &request.platforms)?;
        let args = self.command_args(request, &platforms)?;

        println!(
            "  {} docker buildx build {} ({})",
            "→".blue(),
            request.chain.cyan(),
            platforms
        );
        tracing::debug!(chain = %request.chain, ?args, "Running docker buildx");

        let mut child = Command::new("docker")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Buildx(format!("failed to run docker buildx: {}", e)))?;

        let timeout = self.settings.build_timeout;
        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                child.kill().await.ok();
                return Err(BuildError::Timeout {
                    minutes: timeout.as_secs() / 60,
                });
            }
        };

        if !status.success() {
            return Err(BuildError::Buildx(format!(
                "docker buildx build exited with {}",
                status
            )));
        }

        tracing::info!(chain = %request.chain, "Successfully built: {}", request.tags.join(", "));
        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for BuildxBuilder {
    fn name(&self) -> &str {
        "buildx"
    }

    async fn build(&self, request: &BuildRequest) -> anyhow::Result<()> {
        Ok(self.run(request).await?)
    }
}
