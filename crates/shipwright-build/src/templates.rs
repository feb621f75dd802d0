//! 組み込み Dockerfile テンプレートの選択
//!
//! 作業ディレクトリに `dockerfile/<name>` があればそちらを優先する。

use shipwright_core::DockerfileType;
use std::path::Path;

/// 組み込みテンプレート
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockerfileTemplate {
    /// `dockerfile/` からの相対パス（例: `cosmos/native.Dockerfile`）
    pub name: &'static str,
    contents: &'static str,
    /// ローカルの `dockerfile/<name>` で上書きできるか
    overridable: bool,
}

macro_rules! template {
    ($name:literal) => {
        template!($name, true)
    };
    ($name:literal, $overridable:expr) => {
        DockerfileTemplate {
            name: $name,
            contents: include_str!(concat!("../dockerfile/", $name)),
            overridable: $overridable,
        }
    };
}

pub const COSMOS: DockerfileTemplate = template!("cosmos/Dockerfile");
pub const COSMOS_NATIVE: DockerfileTemplate = template!("cosmos/native.Dockerfile");
pub const COSMOS_LOCAL: DockerfileTemplate = template!("cosmos/local.Dockerfile", false);
pub const COSMOS_LOCAL_CROSS: DockerfileTemplate = template!("cosmos/localcross.Dockerfile");
pub const CARGO: DockerfileTemplate = template!("cargo/Dockerfile");
pub const CARGO_NATIVE: DockerfileTemplate = template!("cargo/native.Dockerfile");
pub const AVALANCHE: DockerfileTemplate = template!("avalanche/Dockerfile");
pub const AVALANCHE_NATIVE: DockerfileTemplate = template!("avalanche/native.Dockerfile");
pub const IMPORTED: DockerfileTemplate = template!("imported/Dockerfile");
pub const AGORIC: DockerfileTemplate = template!("agoric/Dockerfile");
pub const NONE: DockerfileTemplate = template!("none/Dockerfile");

impl DockerfileTemplate {
    /// Dockerfile の種類とビルドモードからテンプレートを選ぶ
    ///
    /// `dockerfile` は非推奨値を解決済みであること。
    pub fn select(dockerfile: DockerfileType, use_buildkit: bool, local: bool) -> Self {
        match dockerfile {
            DockerfileType::Imported => IMPORTED,
            DockerfileType::Agoric => AGORIC,
            DockerfileType::Cargo | DockerfileType::Rust => {
                if use_buildkit {
                    CARGO
                } else {
                    CARGO_NATIVE
                }
            }
            DockerfileType::Cosmos | DockerfileType::Go => match (local, use_buildkit) {
                (true, true) => COSMOS_LOCAL_CROSS,
                (true, false) => COSMOS_LOCAL,
                (false, true) => COSMOS,
                (false, false) => COSMOS_NATIVE,
            },
            DockerfileType::Avalanche => {
                if use_buildkit {
                    AVALANCHE
                } else {
                    AVALANCHE_NATIVE
                }
            }
            DockerfileType::None => NONE,
        }
    }

    pub fn embedded(&self) -> &'static str {
        self.contents
    }

    /// `<dir>/dockerfile/<name>` があればその内容を、なければ組み込み版を返す
    pub fn load(&self, dir: &Path) -> String {
        if !self.overridable {
            return self.contents.to_string();
        }

        let local = dir.join("dockerfile").join(self.name);
        if !local.is_file() {
            tracing::debug!("Using embedded {} due to local dockerfile not found", self.name);
            return self.contents.to_string();
        }

        match std::fs::read_to_string(&local) {
            Ok(contents) => {
                tracing::info!("Using local {}", self.name);
                contents
            }
            Err(e) => {
                tracing::warn!(
                    path = %local.display(),
                    error = %e,
                    "Using embedded {} due to failure to read local dockerfile",
                    self.name
                );
                self.contents.to_string()
            }
        }
    }
}
