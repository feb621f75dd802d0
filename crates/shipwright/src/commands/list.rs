use clap::Args;
use colored::Colorize;
use shipwright_build::GoModFetcher;
use shipwright_core::{ChainNodeConfig, GoMod};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

/// 集計対象のモジュール
pub const TRACKED_MODULES: [&str; 2] = ["cosmos-sdk", "ibc-go"];

const LIST_REF: &str = "main";

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// chains.yaml のパス（省略時はカレントディレクトリを探索）
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
}

/// モジュールごとの major.minor 別チェーン数
#[derive(Debug, Default)]
pub struct VersionStats {
    counts: BTreeMap<&'static str, BTreeMap<String, usize>>,
}

impl VersionStats {
    pub fn new() -> Self {
        Self {
            counts: TRACKED_MODULES
                .iter()
                .map(|m| (*m, BTreeMap::new()))
                .collect(),
        }
    }

    /// go.mod の require から対象モジュールを記録し、見つかった (モジュール, バージョン) を返す
    pub fn record(&mut self, gomod: &GoMod) -> Vec<(&'static str, Result<String, String>)> {
        let mut found = Vec::new();
        for require in gomod.requires.iter().filter(|t| t.len() == 2) {
            for module in TRACKED_MODULES {
                if !require[0].contains(module) {
                    continue;
                }
                let version = &require[1];
                let result = match major_minor(version) {
                    Some(key) => {
                        *self
                            .counts
                            .entry(module)
                            .or_default()
                            .entry(key)
                            .or_insert(0) += 1;
                        Ok(version.clone())
                    }
                    None => Err(format!("parsing module version: {}", version)),
                };
                found.push((module, result));
            }
        }
        found
    }

    pub fn render(&self) -> String {
        let mut out = String::from("\nSummary:\n");
        for module in TRACKED_MODULES {
            let _ = writeln!(out, "\n  {} versions:", module);
            let mut total = 0;
            if let Some(versions) = self.counts.get(module) {
                for (version, count) in versions {
                    let _ = writeln!(out, "    {} ({})", version, count);
                    total += count;
                }
            }
            let _ = writeln!(out, "    total: {} chains", total);
        }
        out
    }
}

/// `v0.47.5` -> `0.47`、`v8` -> `8.0`
pub fn major_minor(version: &str) -> Option<String> {
    let core = version.trim_start_matches('v');
    let core = core.split(['-', '+']).next().unwrap_or(core);
    let mut segments = core.split('.');

    let major: u64 = segments.next()?.parse().ok()?;
    let minor: u64 = match segments.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    Some(format!("{}.{}", major, minor))
}

fn print_error(message: impl std::fmt::Display) {
    println!("  {} {}", "error:".red(), message);
}

pub async fn handle(args: ListArgs) -> anyhow::Result<()> {
    let chains = super::load_chains(args.file.as_deref())?;
    let fetcher = GoModFetcher::new()?;
    let mut stats = VersionStats::new();

    for chain in &chains {
        list_chain(&fetcher, chain, &mut stats).await;
    }

    print!("{}", stats.render());
    Ok(())
}

async fn list_chain(fetcher: &GoModFetcher, chain: &ChainNodeConfig, stats: &mut VersionStats) {
    println!("\n{}:", chain.name.cyan());

    if chain.github_organization.is_empty() || chain.github_repo.is_empty() {
        print_error("not enough repo info; missing organization or repo");
        return;
    }

    let gomod = match fetcher.fetch(chain, LIST_REF, None).await {
        Ok(gomod) => gomod,
        Err(e) => {
            print_error(e);
            return;
        }
    };

    let found = stats.record(&gomod);
    if found.is_empty() {
        print_error("no versions found");
    }
    for (module, result) in found {
        match result {
            Ok(version) => println!("  {}@{}", module, version),
            Err(e) => print_error(e),
        }
    }
}
