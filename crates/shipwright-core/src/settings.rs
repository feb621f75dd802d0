use std::path::PathBuf;
use std::time::Duration;

/// buildx でビルドする際のデフォルトのプラットフォーム
pub const DEFAULT_PLATFORMS: &str = "linux/arm64,linux/amd64";

/// 1ビルドあたりのタイムアウト（分）
pub const DEFAULT_BUILD_TIMEOUT_MINUTES: u64 = 180;

/// 全ジョブ共通のビルド設定
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    /// プッシュ先のコンテナレジストリ（例: ghcr.io/org）
    pub registry: Option<String>,
    pub skip_push: bool,
    /// buildx ビルド結果を OCI tar として書き出すパス
    pub tar_export_path: Option<PathBuf>,
    /// docker buildx (BuildKit) でマルチプラットフォームビルドする
    pub use_buildkit: bool,
    /// `docker buildx --builder` に渡すビルダー名
    pub buildx_builder: Option<String>,
    /// カンマ区切りのプラットフォーム列
    pub platform: String,
    pub no_cache: bool,
    /// BUILD_TIMESTAMP を埋め込んで Dockerfile 内のキャッシュを無効化する
    pub no_build_cache: bool,
    /// go.mod の値より優先する Go バージョン
    pub go_version: Option<String>,
    pub alpine_version: Option<String>,
    /// カレントディレクトリのソースからビルドする
    pub local: bool,
    /// `-race` 付きのバリアントをビルドする
    pub race: bool,
    pub build_timeout: Duration,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            registry: None,
            skip_push: false,
            tar_export_path: None,
            use_buildkit: false,
            buildx_builder: None,
            platform: DEFAULT_PLATFORMS.to_string(),
            no_cache: false,
            no_build_cache: false,
            go_version: None,
            alpine_version: None,
            local: false,
            race: false,
            build_timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_MINUTES * 60),
        }
    }
}

impl BuildSettings {
    /// レジストリが指定され、かつスキップされていない場合のみプッシュする
    pub fn push(&self) -> bool {
        self.registry.as_deref().is_some_and(|r| !r.is_empty()) && !self.skip_push
    }

    /// 要求されたプラットフォーム列
    pub fn requested_platforms(&self) -> Vec<&str> {
        self.platform
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}
