//! チェーン定義 (chains.yaml の1エントリ)

use serde::{Deserialize, Serialize};
use std::fmt;

/// ビルドに使う Dockerfile テンプレートの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockerfileType {
    Cosmos,
    Agoric,
    Avalanche,
    Cargo,
    Imported,
    /// 非推奨: cosmos を使用してください
    Go,
    /// 非推奨: cargo を使用してください
    Rust,
    #[default]
    #[serde(other)]
    None,
}

impl DockerfileType {
    /// 非推奨値と推奨される置き換え先
    const DEPRECATIONS: [(DockerfileType, DockerfileType); 2] = [
        (DockerfileType::Go, DockerfileType::Cosmos),
        (DockerfileType::Rust, DockerfileType::Cargo),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DockerfileType::Cosmos => "cosmos",
            DockerfileType::Agoric => "agoric",
            DockerfileType::Avalanche => "avalanche",
            DockerfileType::Cargo => "cargo",
            DockerfileType::Imported => "imported",
            DockerfileType::Go => "go",
            DockerfileType::Rust => "rust",
            DockerfileType::None => "none",
        }
    }

    /// 非推奨値であれば推奨値を返す
    pub fn replacement(&self) -> Option<DockerfileType> {
        Self::DEPRECATIONS
            .iter()
            .find(|(deprecated, _)| deprecated == self)
            .map(|(_, replacement)| *replacement)
    }

    /// go.mod を必須とする（Go ツールチェーンでビルドする）種類か
    pub fn requires_go_mod(&self) -> bool {
        matches!(self, DockerfileType::Cosmos | DockerfileType::Avalanche)
    }
}

impl fmt::Display for DockerfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DockerfileType {
    fn from(value: &str) -> Self {
        match value {
            "cosmos" => DockerfileType::Cosmos,
            "agoric" => DockerfileType::Agoric,
            "avalanche" => DockerfileType::Avalanche,
            "cargo" => DockerfileType::Cargo,
            "imported" => DockerfileType::Imported,
            "go" => DockerfileType::Go,
            "rust" => DockerfileType::Rust,
            _ => DockerfileType::None,
        }
    }
}

/// チェーンノードのビルド設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChainNodeConfig {
    pub name: String,
    pub repo_host: Option<String>,
    pub github_organization: String,
    pub github_repo: String,
    /// 非推奨: dockerfile を使用してください
    pub language: Option<DockerfileType>,
    pub dockerfile: Option<DockerfileType>,
    pub build_target: String,
    pub final_image: String,
    pub build_dir: String,
    pub binaries: Vec<String>,
    pub libraries: Vec<String>,
    pub target_libraries: Vec<String>,
    pub directories: Vec<String>,
    pub pre_build: String,
    pub platforms: Vec<String>,
    pub build_env: Vec<String>,
    pub base_image: String,
}

impl ChainNodeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 非推奨設定を解決した Dockerfile の種類
    ///
    /// `language` は `dockerfile` が未指定の場合のみ使われる。
    pub fn effective_dockerfile(&self) -> DockerfileType {
        let mut dockerfile = self.dockerfile;

        if let Some(language) = self.language {
            tracing::warn!(
                chain = %self.name,
                "'language' chain config property is deprecated, please use 'dockerfile' instead"
            );
            if dockerfile.is_none() {
                dockerfile = Some(language);
            }
        }

        let dockerfile = dockerfile.unwrap_or_default();
        match dockerfile.replacement() {
            Some(replacement) => {
                tracing::warn!(
                    chain = %self.name,
                    "'dockerfile' value of '{}' is deprecated, please use '{}' instead",
                    dockerfile,
                    replacement
                );
                replacement
            }
            None => dockerfile,
        }
    }

    /// リポジトリホスト（未指定時は github.com）
    pub fn repo_host(&self) -> &str {
        match self.repo_host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => "github.com",
        }
    }

    pub fn is_github_hosted(&self) -> bool {
        self.repo_host() == "github.com"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_kebab_case() {
        let yaml = r#"
name: gaia
github-organization: cosmos
github-repo: gaia
dockerfile: cosmos
build-target: make install
binaries:
  - /go/bin/gaiad
build-env:
  - LEDGER_ENABLED=false
  - BUILD_TAGS=muslc
"#;
        let chain: ChainNodeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(chain.name, "gaia");
        assert_eq!(chain.github_organization, "cosmos");
        assert_eq!(chain.dockerfile, Some(DockerfileType::Cosmos));
        assert_eq!(chain.binaries, vec!["/go/bin/gaiad"]);
        assert_eq!(chain.build_env.len(), 2);
        assert_eq!(chain.repo_host(), "github.com");
    }

    #[test]
    fn test_unknown_dockerfile_is_none() {
        let chain: ChainNodeConfig =
            serde_yaml::from_str("name: x\ndockerfile: something-else\n").unwrap();
        assert_eq!(chain.dockerfile, Some(DockerfileType::None));
        assert_eq!(chain.effective_dockerfile(), DockerfileType::None);
    }

    #[test]
    fn test_language_used_when_dockerfile_missing() {
        let mut chain = ChainNodeConfig::new("osmosis");
        chain.language = Some(DockerfileType::Cargo);
        assert_eq!(chain.effective_dockerfile(), DockerfileType::Cargo);

        chain.dockerfile = Some(DockerfileType::Imported);
        assert_eq!(chain.effective_dockerfile(), DockerfileType::Imported);
    }

    #[test]
    fn test_deprecated_values_are_replaced() {
        let mut chain = ChainNodeConfig::new("juno");
        chain.dockerfile = Some(DockerfileType::Go);
        assert_eq!(chain.effective_dockerfile(), DockerfileType::Cosmos);

        chain.dockerfile = None;
        chain.language = Some(DockerfileType::Rust);
        assert_eq!(chain.effective_dockerfile(), DockerfileType::Cargo);
    }

    #[test]
    fn test_repo_host_default() {
        let mut chain = ChainNodeConfig::new("x");
        chain.repo_host = Some(String::new());
        assert!(chain.is_github_hosted());

        chain.repo_host = Some("gitlab.com".to_string());
        assert_eq!(chain.repo_host(), "gitlab.com");
        assert!(!chain.is_github_hosted());
    }
}
