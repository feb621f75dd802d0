//! GitHub リリース一覧の取得

use anyhow::Context;
use colored::Colorize;
use serde::Deserialize;
use shipwright_core::{ChainJobList, ChainNodeConfig};
use std::sync::Arc;
use std::time::Duration;

const GITHUB_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const GH_USER_ENV: &str = "GH_USER";
pub const GH_PAT_ENV: &str = "GH_PAT";

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
}

pub struct ReleaseLister {
    client: reqwest::Client,
    api_base: String,
    credentials: Option<(String, String)>,
}

impl ReleaseLister {
    /// GH_USER / GH_PAT が両方あれば Basic 認証する
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shipwright/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let credentials = match (std::env::var(GH_USER_ENV), std::env::var(GH_PAT_ENV)) {
            (Ok(user), Ok(pat)) if !user.is_empty() && !pat.is_empty() => Some((user, pat)),
            _ => None,
        };

        Ok(Self {
            client,
            api_base: GITHUB_API_BASE.to_string(),
            credentials,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pat: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pat.into()));
        self
    }

    pub fn releases_url(&self, chain: &ChainNodeConfig, number: usize) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page={}&page=1",
            self.api_base, chain.github_organization, chain.github_repo, number
        )
    }

    /// 新しい順に最大 `number` 件のリリースをジョブ列にする（先頭が latest）
    ///
    /// github.com 以外でホストされているチェーンは空のジョブ列になる。
    pub async fn most_recent_releases(
        &self,
        chain: Arc<ChainNodeConfig>,
        number: usize,
    ) -> anyhow::Result<ChainJobList> {
        if chain.github_organization.is_empty() || chain.github_repo.is_empty() {
            anyhow::bail!(
                "github organization: {} and/or repo: {} not provided for chain: {}",
                chain.github_organization,
                chain.github_repo,
                chain.name
            );
        }

        if !chain.is_github_hosted() {
            tracing::debug!(
                chain = %chain.name,
                repo_host = chain.repo_host(),
                "Skipping release lookup for non-github repository"
            );
            return Ok(ChainJobList::new());
        }

        println!(
            "Fetching most recent releases for {}",
            format!(
                "github.com/{}/{}",
                chain.github_organization, chain.github_repo
            )
            .cyan()
        );

        let mut request = self.client.get(self.releases_url(&chain, number));
        if let Some((user, pat)) = &self.credentials {
            request = request.basic_auth(user, Some(pat));
        }

        let response = request
            .send()
            .await
            .context("error performing github releases request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("status code: {}", status.as_u16());
        }

        let body = response
            .text()
            .await
            .context("error reading body from github releases request")?;
        let releases: Vec<GithubRelease> = serde_json::from_str(&body).with_context(|| {
            format!("error parsing github releases response: {}", body)
        })?;

        for release in &releases {
            tracing::info!(chain = %chain.name, "Adding release tag to build queue: {}", release.tag_name);
        }

        Ok(ChainJobList::from_releases(
            chain,
            releases.into_iter().map(|r| r.tag_name),
        ))
    }
}
