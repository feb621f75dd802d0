//! ビルド対象リポジトリの go.mod 取得

use crate::error::{BuildError, BuildResult};
use shipwright_core::{ChainNodeConfig, GoMod};
use std::path::{Path, PathBuf};
use std::time::Duration;

const RAW_GITHUB_BASE: &str = "https://raw.githubusercontent.com";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// go.mod の取得元
#[derive(Debug, Clone)]
pub struct GoModFetcher {
    client: reqwest::Client,
    raw_base: String,
}

impl GoModFetcher {
    pub fn new() -> BuildResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shipwright/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            raw_base: RAW_GITHUB_BASE.to_string(),
        })
    }

    /// raw ファイル配信のベース URL を差し替える（ミラー利用時）
    pub fn with_raw_base(mut self, raw_base: impl Into<String>) -> Self {
        self.raw_base = raw_base.into().trim_end_matches('/').to_string();
        self
    }

    /// `git_ref` 時点の go.mod を取得する
    ///
    /// ローカルビルドでは `source_dir` 配下の go.mod を読む。
    pub async fn fetch(
        &self,
        chain: &ChainNodeConfig,
        git_ref: &str,
        local_source: Option<&Path>,
    ) -> BuildResult<GoMod> {
        let content = match local_source {
            Some(dir) => {
                let path = local_path(dir, &chain.build_dir);
                std::fs::read_to_string(&path).map_err(|e| {
                    BuildError::GoModFetch(format!(
                        "failed to read {} for local build: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            None => self.fetch_remote(chain, git_ref).await?,
        };

        GoMod::parse(&content)
            .map_err(|e| BuildError::GoModFetch(format!("failed to parse go.mod file: {}", e)))
    }

    async fn fetch_remote(&self, chain: &ChainNodeConfig, git_ref: &str) -> BuildResult<String> {
        let url = self.raw_url(chain, git_ref)?;
        tracing::debug!(chain = %chain.name, url = %url, "Fetching go.mod");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BuildError::GoModFetch(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(BuildError::GoModFetch(format!(
                "GET {}: {}",
                url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// go.mod の raw ファイル URL
    pub fn raw_url(&self, chain: &ChainNodeConfig, git_ref: &str) -> BuildResult<String> {
        if !chain.is_github_hosted() {
            return Err(BuildError::GoModFetch(format!(
                "go.mod lookup is only supported for github.com repositories (repo host: {})",
                chain.repo_host()
            )));
        }
        if chain.github_organization.is_empty() || chain.github_repo.is_empty() {
            return Err(BuildError::GoModFetch(format!(
                "github organization and repo are required to fetch go.mod for chain: {}",
                chain.name
            )));
        }

        Ok(format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            chain.github_organization,
            chain.github_repo,
            git_ref,
            gomod_path(&chain.build_dir)
        ))
    }
}

/// リポジトリ内の go.mod の相対パス
fn gomod_path(build_dir: &str) -> String {
    let dir = build_dir.trim_start_matches("./").trim_matches('/');
    if dir.is_empty() || dir == "." {
        "go.mod".to_string()
    } else {
        format!("{}/go.mod", dir)
    }
}

fn local_path(source_dir: &Path, build_dir: &str) -> PathBuf {
    source_dir.join(gomod_path(build_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ChainNodeConfig {
        ChainNodeConfig {
            github_organization: "cosmos".to_string(),
            github_repo: "gaia".to_string(),
            ..ChainNodeConfig::new("gaia")
        }
    }

    #[test]
    fn test_raw_url() {
        let fetcher = GoModFetcher::new().unwrap();
        assert_eq!(
            fetcher.raw_url(&chain(), "v15.0.0").unwrap(),
            "https://raw.githubusercontent.com/cosmos/gaia/v15.0.0/go.mod"
        );

        let mut nested = chain();
        nested.build_dir = "./app/".to_string();
        assert_eq!(
            fetcher.raw_url(&nested, "main").unwrap(),
            "https://raw.githubusercontent.com/cosmos/gaia/main/app/go.mod"
        );
    }

    #[test]
    fn test_raw_url_requires_github() {
        let fetcher = GoModFetcher::new().unwrap();
        let mut chain = chain();
        chain.repo_host = Some("gitlab.com".to_string());
        assert!(matches!(
            fetcher.raw_url(&chain, "main"),
            Err(BuildError::GoModFetch(_))
        ));

        let fetcher = fetcher.with_raw_base("https://mirror.example.com/");
        let chain = ChainNodeConfig::new("orphan");
        assert!(fetcher.raw_url(&chain, "main").is_err());
    }

    #[tokio::test]
    async fn test_fetch_local() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("app")).unwrap();
        std::fs::write(
            temp_dir.path().join("app/go.mod"),
            "module github.com/cosmos/gaia\n\ngo 1.21\n\nrequire github.com/CosmWasm/wasmvm v1.5.0\n",
        )
        .unwrap();

        let mut chain = chain();
        chain.build_dir = "app".to_string();

        let fetcher = GoModFetcher::new().unwrap();
        let gomod = fetcher
            .fetch(&chain, "", Some(temp_dir.path()))
            .await
            .unwrap();
        assert_eq!(gomod.go_version.as_deref(), Some("1.21"));
        assert_eq!(
            gomod.wasmvm_version().as_deref(),
            Some("github.com/CosmWasm/wasmvm v1.5.0")
        );
    }

    #[tokio::test]
    async fn test_fetch_local_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = GoModFetcher::new().unwrap();
        let err = fetcher
            .fetch(&chain(), "", Some(temp_dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("for local build"));
    }
}
