use shipwright_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid image tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error(
        "no requested platforms are supported for this chain: {chain}. requested: {requested}, supported: {supported}"
    )]
    NoSupportedPlatforms {
        chain: String,
        requested: String,
        supported: String,
    },

    #[error("when using tar-export-path, only one platform is supported (requested: {platforms})")]
    TarExportMultiPlatform { platforms: String },

    #[error("error getting mod file: {0}")]
    GoModFetch(String),

    #[error("docker buildx build failed: {0}")]
    Buildx(String),

    #[error("build timed out after {minutes} minutes")]
    Timeout { minutes: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerConnection(e) => {
                format!(
                    "Docker に接続できません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Docker デーモンが起動しているか確認してください\n\
                     2. DOCKER_HOST の設定を確認してください",
                    e
                )
            }
            BuildError::NoSupportedPlatforms {
                chain, supported, ..
            } => {
                format!(
                    "{} はリクエストされたプラットフォームをサポートしていません\n\
                     \n\
                     --platform にサポート対象 ({}) のいずれかを指定してください。",
                    chain, supported
                )
            }
            BuildError::Buildx(msg) => {
                format!(
                    "docker buildx build に失敗しました: {}\n\
                     \n\
                     `docker buildx ls` でビルダーが利用可能か確認してください。",
                    msg
                )
            }
            BuildError::GoModFetch(msg) => {
                format!(
                    "go.mod を取得できませんでした: {}\n\
                     \n\
                     github-organization / github-repo / build-dir と git ref を確認してください。\n\
                     GitHub のレート制限に達している場合は GH_USER / GH_PAT を設定してください。",
                    msg
                )
            }
            BuildError::Timeout { minutes } => {
                format!(
                    "ビルドが {} 分以内に完了しませんでした。\n\
                     \n\
                     ビルドキャッシュの状態やネットワークを確認してください。",
                    minutes
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
