//! チェーン定義ファイルの探索と読み込み

use crate::chain::ChainNodeConfig;
use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};

/// チェーン定義のパスを直接指定する環境変数
pub const CHAINS_ENV: &str = "SHIPWRIGHT_CHAINS";

/// YAML 文字列からチェーン定義を読み込む
pub fn parse_chains(content: &str) -> Result<Vec<ChainNodeConfig>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let chains: Vec<ChainNodeConfig> = serde_yaml::from_str(content)?;
    Ok(chains)
}

/// ファイル、またはディレクトリ内の `*.yaml` / `*.yml` をすべて読み込む
///
/// ディレクトリの場合はファイル名順に連結する。
pub fn load_chains(path: &Path) -> Result<Vec<ChainNodeConfig>> {
    if !path.exists() {
        return Err(CoreError::ChainsLoad {
            path: path.to_path_buf(),
            message: "path does not exist".to_string(),
        });
    }

    if path.is_file() {
        return load_chains_file(path);
    }

    let mut files = Vec::new();
    for ext in ["yaml", "yml"] {
        let pattern = path.join(format!("*.{}", ext));
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|e| CoreError::ChainsLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        files.extend(entries.filter_map(|entry| entry.ok()));
    }
    files.sort();

    if files.is_empty() {
        return Err(CoreError::ChainsLoad {
            path: path.to_path_buf(),
            message: "no *.yaml or *.yml files in directory".to_string(),
        });
    }

    let mut chains = Vec::new();
    for file in &files {
        chains.extend(load_chains_file(file)?);
    }
    tracing::debug!(
        "Loaded {} chains from {} files in {}",
        chains.len(),
        files.len(),
        path.display()
    );
    Ok(chains)
}

fn load_chains_file(path: &Path) -> Result<Vec<ChainNodeConfig>> {
    let content = std::fs::read_to_string(path)?;
    parse_chains(&content).map_err(|e| CoreError::ChainsLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// チェーン定義を探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 SHIPWRIGHT_CHAINS (直接パス指定)
/// 2. カレントディレクトリ: chains.yaml, chains.yml
/// 3. ./chains/ ディレクトリ
pub fn find_chains_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var(CHAINS_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} is set but does not exist: {}", CHAINS_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["chains.yaml", "chains.yml"] {
        let path = current_dir.join(filename);
        if path.is_file() {
            return Ok(path);
        }
    }

    let chains_dir = current_dir.join("chains");
    if chains_dir.is_dir() {
        return Ok(chains_dir);
    }

    Err(CoreError::ChainsNotFound)
}

/// 名前でチェーンを探す
pub fn find_chain<'a>(chains: &'a [ChainNodeConfig], name: &str) -> Result<&'a ChainNodeConfig> {
    chains
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| CoreError::ChainNotFound(name.to_string()))
}
