//! go.mod の最小限のパーサ
//!
//! ビルドに必要なのは `go` ディレクティブと、wasmvm の require / replace のみ。

use crate::error::{CoreError, Result};

const DEFAULT_WASMVM_REPO: &str = "github.com/CosmWasm/wasmvm";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoMod {
    pub module: Option<String>,
    pub go_version: Option<String>,
    /// require 行のトークン列（例: ["github.com/foo/bar", "v1.2.3"]）
    pub requires: Vec<Vec<String>>,
    /// replace 行のトークン列（例: ["a", "=>", "b", "v1.0.0"]）
    pub replaces: Vec<Vec<String>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Block {
    Require,
    Replace,
    Other,
}

impl GoMod {
    pub fn parse(content: &str) -> Result<Self> {
        let mut gomod = GoMod::default();
        let mut block: Option<Block> = None;

        for (i, raw) in content.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(current) = block {
                if line == ")" {
                    block = None;
                    continue;
                }
                gomod.push_entry(current, tokens(line));
                continue;
            }

            let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();
            let kind = match keyword {
                "require" => Block::Require,
                "replace" => Block::Replace,
                "module" => {
                    gomod.module = Some(rest.trim_matches('"').to_string());
                    continue;
                }
                "go" => {
                    gomod.go_version = Some(rest.to_string());
                    continue;
                }
                "exclude" | "retract" | "toolchain" | "godebug" => Block::Other,
                _ => {
                    return Err(CoreError::GoModParse {
                        line: i + 1,
                        message: format!("unknown directive: {}", keyword),
                    });
                }
            };

            if rest == "(" {
                block = Some(kind);
            } else if !rest.is_empty() {
                gomod.push_entry(kind, tokens(rest));
            }
        }

        if block.is_some() {
            return Err(CoreError::GoModParse {
                line: content.lines().count(),
                message: "unterminated block".to_string(),
            });
        }

        Ok(gomod)
    }

    fn push_entry(&mut self, block: Block, tokens: Vec<String>) {
        match block {
            Block::Require => self.requires.push(tokens),
            Block::Replace => self.replaces.push(tokens),
            Block::Other => {}
        }
    }

    /// require の中から `path` を含むモジュールのバージョンを探す
    pub fn required_version(&self, path: &str) -> Option<(&str, &str)> {
        self.requires
            .iter()
            .filter(|t| t.len() == 2 && t[0].contains(path))
            .map(|t| (t[0].as_str(), t[1].as_str()))
            .next()
    }

    /// wasmvm の "リポジトリ バージョン"
    ///
    /// require を先に見て、replace があればそちらで上書きする。
    pub fn wasmvm_version(&self) -> Option<String> {
        let mut repo = DEFAULT_WASMVM_REPO.to_string();
        let mut version = String::new();

        for t in &self.requires {
            if t.len() == 2 && t[0].contains(&repo) {
                repo = t[0].clone();
                version = t[1].clone();
            }
        }

        for t in &self.replaces {
            if t.len() > 2 && t[0].contains(&repo) {
                repo = t[t.len() - 2].clone();
                version = t[t.len() - 1].clone();
            }
        }

        tracing::debug!(repo = %repo, version = %version, "wasmvm from go.mod");

        if version.is_empty() {
            return None;
        }
        Some(format!("{} {}", repo, version))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(|t| t.trim_matches('"').to_string())
        .collect()
}
