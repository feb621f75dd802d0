pub mod build;
pub mod list;

use anyhow::Context;
use colored::Colorize;
use shipwright_core::ChainNodeConfig;
use std::path::Path;

/// バイナリに埋め込んだデフォルトのチェーン定義
pub const EMBEDDED_CHAINS: &str = include_str!("../../chains.yaml");

/// チェーン定義を読み込む
///
/// `--file` が指定された場合は読み込みの失敗をそのままエラーにする。
/// 未指定なら探索し、見つからなければ埋め込みの定義を使う。
pub fn load_chains(file: Option<&Path>) -> anyhow::Result<Vec<ChainNodeConfig>> {
    if let Some(path) = file {
        let chains = shipwright_core::load_chains(path)
            .with_context(|| format!("failed to load chains from {}", path.display()))?;
        println!("Loaded chains from {}", path.display().to_string().cyan());
        return Ok(chains);
    }

    let discovered = shipwright_core::find_chains_path().and_then(|path| {
        let chains = shipwright_core::load_chains(&path)?;
        Ok((path, chains))
    });

    match discovered {
        Ok((path, chains)) => {
            println!("Loaded chains from {}", path.display().to_string().cyan());
            Ok(chains)
        }
        Err(e) => {
            tracing::debug!("Chain discovery failed: {}", e);
            println!(
                "{}",
                "No chains config found, using embedded chains. pass -f to configure chains.yaml path."
                    .yellow()
            );
            embedded_chains()
        }
    }
}

pub fn embedded_chains() -> anyhow::Result<Vec<ChainNodeConfig>> {
    shipwright_core::parse_chains(EMBEDDED_CHAINS).context("error parsing embedded chains.yaml")
}
