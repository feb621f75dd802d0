//! ジョブごとのビルドコンテキスト生成
//!
//! テンプレートを選んでスクラッチディレクトリに Dockerfile を書き出し、
//! タグとビルド引数を組み立てる。

use crate::gomod::GoModFetcher;
use crate::templates::DockerfileTemplate;
use async_trait::async_trait;
use shipwright_core::tag::{image_name, image_tag, image_tags, race_tags};
use shipwright_core::{
    BuildJob, BuildSettings, ChainNodeConfig, ContextRenderer, GoVersion, RenderedBuild,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// BUILD_ENV から分離して渡す変数
const BUILD_TAGS_VAR: &str = "BUILD_TAGS";

pub struct TemplateRenderer {
    settings: Arc<BuildSettings>,
    fetcher: GoModFetcher,
    /// `dockerfile/` の上書きとローカルソースを探すディレクトリ
    working_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(settings: Arc<BuildSettings>, fetcher: GoModFetcher, working_dir: PathBuf) -> Self {
        Self {
            settings,
            fetcher,
            working_dir,
        }
    }

    fn local_source(&self) -> Option<&Path> {
        self.settings.local.then_some(self.working_dir.as_path())
    }
}

#[async_trait]
impl ContextRenderer for TemplateRenderer {
    async fn render(&self, job: &BuildJob, scratch_dir: &Path) -> anyhow::Result<RenderedBuild> {
        let chain = job.chain.as_ref();
        let settings = self.settings.as_ref();
        let dockerfile_type = chain.effective_dockerfile();

        let template =
            DockerfileTemplate::select(dockerfile_type, settings.use_buildkit, settings.local);
        let dockerfile = scratch_dir.join("Dockerfile");
        std::fs::write(&dockerfile, template.load(&self.working_dir)).map_err(|e| {
            anyhow::anyhow!("error writing temporary dockerfile {}: {}", template.name, e)
        })?;

        let tag = image_tag(&job.version, job.tag.as_deref(), settings.local);
        let image = image_name(settings.registry.as_deref(), &chain.name);
        let mut tags = image_tags(&image, &tag, job.latest);

        let gomod = self
            .fetcher
            .fetch(chain, &job.version, self.local_source())
            .await;

        let mut toolchain = ToolchainArgs::default();
        let go_version = settings
            .go_version
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| gomod.as_ref().ok().and_then(|m| m.go_version.clone()));
        if let Some(go_version) = go_version {
            toolchain.go = GoVersion::for_go_version(&go_version, settings.alpine_version.as_deref());
        }

        if dockerfile_type.requires_go_mod() {
            let gomod = gomod?;
            toolchain.wasmvm = gomod.wasmvm_version().unwrap_or_default();
            toolchain.race = settings.race;
            if settings.race {
                tags = race_tags(tags);
            }
            tracing::info!(
                chain = %chain.name,
                "Go version from go.mod: {}, will build with version: {} image: {}",
                gomod.go_version.as_deref().unwrap_or(""),
                toolchain.go.version,
                toolchain.go.image
            );
        } else if let Err(e) = &gomod {
            tracing::debug!(chain = %chain.name, error = %e, "go.mod not available");
        }

        let build_from = if settings.local {
            "current working directory source".to_string()
        } else {
            format!("ref: {}", job.version)
        };
        tracing::info!(
            chain = %chain.name,
            template = template.name,
            tags = ?tags,
            "Building image from {}",
            build_from
        );

        Ok(RenderedBuild {
            tags,
            build_args: build_args(job, settings, &toolchain),
            dockerfile,
            source_dir: self.local_source().map(Path::to_path_buf),
        })
    }
}

/// go.mod から決まるビルド引数
#[derive(Debug, Default)]
struct ToolchainArgs {
    go: GoVersion,
    wasmvm: String,
    race: bool,
}

fn build_args(
    job: &BuildJob,
    settings: &BuildSettings,
    toolchain: &ToolchainArgs,
) -> BTreeMap<String, String> {
    let chain = job.chain.as_ref();
    let (mut build_env, build_tags) = split_build_env(chain);
    if toolchain.race {
        build_env.push("GOFLAGS=-race".to_string());
    }

    let build_dir = if chain.build_dir.is_empty() {
        ".".to_string()
    } else {
        chain.build_dir.clone()
    };

    let build_timestamp = if settings.no_build_cache {
        chrono::Utc::now().timestamp().to_string()
    } else {
        String::new()
    };

    [
        ("VERSION", job.version.clone()),
        ("BASE_VERSION", toolchain.go.image.clone()),
        ("NAME", chain.name.clone()),
        ("BASE_IMAGE", chain.base_image.clone()),
        ("REPO_HOST", chain.repo_host().to_string()),
        ("GITHUB_ORGANIZATION", chain.github_organization.clone()),
        ("GITHUB_REPO", chain.github_repo.clone()),
        ("BUILD_TARGET", chain.build_target.clone()),
        ("BINARIES", chain.binaries.join(",")),
        ("LIBRARIES", chain.libraries.join(" ")),
        ("TARGET_LIBRARIES", chain.target_libraries.join(" ")),
        ("DIRECTORIES", chain.directories.join(" ")),
        ("PRE_BUILD", chain.pre_build.clone()),
        ("FINAL_IMAGE", chain.final_image.clone()),
        ("BUILD_ENV", build_env.join(" ")),
        ("BUILD_TAGS", build_tags),
        ("BUILD_DIR", build_dir),
        ("BUILD_TIMESTAMP", build_timestamp),
        ("GO_VERSION", toolchain.go.version.clone()),
        ("WASMVM_VERSION", toolchain.wasmvm.clone()),
        ("RACE", race_flag(toolchain.race)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn race_flag(race: bool) -> String {
    if race { "true".to_string() } else { String::new() }
}

/// build-env を (BUILD_TAGS 以外, BUILD_TAGS エントリ) に分ける
fn split_build_env(chain: &ChainNodeConfig) -> (Vec<String>, String) {
    let mut env = Vec::new();
    let mut build_tags = String::new();

    for entry in chain.build_env.iter().filter(|e| !e.is_empty()) {
        let key = entry.split('=').next().unwrap_or_default();
        if key == BUILD_TAGS_VAR {
            build_tags = entry.clone();
        } else {
            env.push(entry.clone());
        }
    }

    (env, build_tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_core::DockerfileType;

    fn settings() -> BuildSettings {
        BuildSettings {
            registry: Some("ghcr.io/org".to_string()),
            ..Default::default()
        }
    }

    fn renderer(settings: BuildSettings, working_dir: &Path) -> TemplateRenderer {
        TemplateRenderer::new(
            Arc::new(settings),
            GoModFetcher::new().unwrap(),
            working_dir.to_path_buf(),
        )
    }

    fn cargo_chain() -> Arc<ChainNodeConfig> {
        Arc::new(ChainNodeConfig {
            dockerfile: Some(DockerfileType::Cargo),
            github_organization: "example".to_string(),
            github_repo: "node".to_string(),
            binaries: vec!["target/release/node".to_string(), "tool:bin".to_string()],
            libraries: vec!["liba.so".to_string(), "libb.so".to_string()],
            directories: vec!["/etc/node".to_string()],
            build_env: vec![
                "FOO=1".to_string(),
                "BUILD_TAGS=muslc ledger".to_string(),
                "BAR=2".to_string(),
            ],
            ..ChainNodeConfig::new("node")
        })
    }

    fn local_cosmos_chain() -> Arc<ChainNodeConfig> {
        Arc::new(ChainNodeConfig {
            dockerfile: Some(DockerfileType::Cosmos),
            ..ChainNodeConfig::new("gaia")
        })
    }

    fn write_gomod(dir: &Path) {
        std::fs::write(
            dir.join("go.mod"),
            "module github.com/cosmos/gaia\n\ngo 1.21.4\n\nrequire (\n\tgithub.com/CosmWasm/wasmvm v1.5.2\n)\n",
        )
        .unwrap();
    }

    #[test]
    fn test_split_build_env() {
        let (env, tags) = split_build_env(&cargo_chain());
        assert_eq!(env, vec!["FOO=1", "BAR=2"]);
        assert_eq!(tags, "BUILD_TAGS=muslc ledger");
    }

    #[tokio::test]
    async fn test_render_cargo_without_gomod() {
        let working_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let job = BuildJob::new(cargo_chain(), "v1.2.0").with_latest(true);

        let mut settings = settings();
        settings.local = true;
        let rendered = renderer(settings, working_dir.path())
            .render(&job, scratch.path())
            .await
            .unwrap();

        assert_eq!(
            rendered.tags,
            vec!["ghcr.io/org/node:v1.2.0", "ghcr.io/org/node:latest"]
        );
        assert_eq!(rendered.dockerfile, scratch.path().join("Dockerfile"));
        assert_eq!(
            std::fs::read_to_string(&rendered.dockerfile).unwrap(),
            crate::templates::CARGO_NATIVE.embedded()
        );

        let args = &rendered.build_args;
        assert_eq!(args["VERSION"], "v1.2.0");
        assert_eq!(args["NAME"], "node");
        assert_eq!(args["REPO_HOST"], "github.com");
        assert_eq!(args["BINARIES"], "target/release/node,tool:bin");
        assert_eq!(args["LIBRARIES"], "liba.so libb.so");
        assert_eq!(args["DIRECTORIES"], "/etc/node");
        assert_eq!(args["BUILD_ENV"], "FOO=1 BAR=2");
        assert_eq!(args["BUILD_TAGS"], "BUILD_TAGS=muslc ledger");
        assert_eq!(args["BUILD_DIR"], ".");
        assert_eq!(args["BUILD_TIMESTAMP"], "");
        assert_eq!(args["GO_VERSION"], "");
        assert_eq!(args["RACE"], "");
        assert_eq!(args.len(), 21);
    }

    #[tokio::test]
    async fn test_render_local_cosmos_with_race() {
        let working_dir = tempfile::tempdir().unwrap();
        write_gomod(working_dir.path());
        let scratch = tempfile::tempdir().unwrap();
        let job = BuildJob::new(local_cosmos_chain(), "");

        let settings = BuildSettings {
            local: true,
            race: true,
            no_build_cache: true,
            ..Default::default()
        };
        let rendered = renderer(settings, working_dir.path())
            .render(&job, scratch.path())
            .await
            .unwrap();

        assert_eq!(rendered.tags, vec!["gaia:local-race"]);
        assert_eq!(rendered.source_dir.as_deref(), Some(working_dir.path()));

        let args = &rendered.build_args;
        assert_eq!(args["GO_VERSION"], "1.21.13");
        assert_eq!(args["BASE_VERSION"], "1.21.13-alpine3.20");
        assert_eq!(args["WASMVM_VERSION"], "github.com/CosmWasm/wasmvm v1.5.2");
        assert_eq!(args["RACE"], "true");
        assert_eq!(args["BUILD_ENV"], "GOFLAGS=-race");
        assert!(!args["BUILD_TIMESTAMP"].is_empty());
        assert_eq!(
            std::fs::read_to_string(&rendered.dockerfile).unwrap(),
            crate::templates::COSMOS_LOCAL.embedded()
        );
    }

    #[tokio::test]
    async fn test_go_version_flag_overrides_gomod() {
        let working_dir = tempfile::tempdir().unwrap();
        write_gomod(working_dir.path());
        let scratch = tempfile::tempdir().unwrap();

        let settings = BuildSettings {
            local: true,
            use_buildkit: true,
            go_version: Some("1.22".to_string()),
            alpine_version: Some("3.19".to_string()),
            ..Default::default()
        };
        let rendered = renderer(settings, working_dir.path())
            .render(&BuildJob::new(local_cosmos_chain(), "main"), scratch.path())
            .await
            .unwrap();

        assert_eq!(rendered.tags, vec!["gaia:main"]);
        assert_eq!(rendered.build_args["GO_VERSION"], "1.22.12");
        assert_eq!(rendered.build_args["BASE_VERSION"], "1.22.12-alpine3.19");
        assert_eq!(
            std::fs::read_to_string(&rendered.dockerfile).unwrap(),
            crate::templates::COSMOS_LOCAL_CROSS.embedded()
        );
    }

    #[tokio::test]
    async fn test_cosmos_requires_gomod() {
        let working_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let settings = BuildSettings {
            local: true,
            ..Default::default()
        };

        let err = renderer(settings, working_dir.path())
            .render(&BuildJob::new(local_cosmos_chain(), ""), scratch.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("error getting mod file"));
    }

    #[tokio::test]
    async fn test_explicit_tag_and_local_dockerfile_override() {
        let working_dir = tempfile::tempdir().unwrap();
        let override_dir = working_dir.path().join("dockerfile").join("cargo");
        std::fs::create_dir_all(&override_dir).unwrap();
        std::fs::write(override_dir.join("native.Dockerfile"), "FROM custom").unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let job = BuildJob::new(cargo_chain(), "release/v2").with_tag("nightly");
        let mut settings = settings();
        settings.local = true;
        let rendered = renderer(settings, working_dir.path())
            .render(&job, scratch.path())
            .await
            .unwrap();

        assert_eq!(rendered.tags, vec!["ghcr.io/org/node:nightly"]);
        assert_eq!(
            std::fs::read_to_string(&rendered.dockerfile).unwrap(),
            "FROM custom"
        );
    }
}
