//! レジストリ認証処理
//!
//! 環境変数 DOCKER_USER / DOCKER_PASSWORD、または Docker config.json から
//! 認証情報を取得し、Bollard の DockerCredentials に変換します。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub const DOCKER_USER_ENV: &str = "DOCKER_USER";
pub const DOCKER_PASSWORD_ENV: &str = "DOCKER_PASSWORD";

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// レジストリ認証を管理
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
    env_credentials: Option<(String, String)>,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// 環境変数と ~/.docker/config.json（DOCKER_CONFIG で変更可）を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        let env_credentials = match (
            std::env::var(DOCKER_USER_ENV),
            std::env::var(DOCKER_PASSWORD_ENV),
        ) {
            (Ok(user), Ok(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        };

        Self {
            config_path,
            env_credentials,
        }
    }

    /// 指定したパスの config.json を使用（環境変数は参照しない）
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self {
            config_path,
            env_credentials: None,
        }
    }

    /// イメージ名からレジストリの認証情報を取得
    ///
    /// # Returns
    /// * `Ok(Some(credentials))` - 認証情報が見つかった場合
    /// * `Ok(None)` - 認証情報が不要または見つからない場合
    /// * `Err(e)` - config.json の読み込みに失敗した場合
    pub fn get_credentials(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = extract_registry(image);

        // 1. 環境変数
        if let Some((username, password)) = &self.env_credentials {
            tracing::debug!("Using {} credentials for {}", DOCKER_USER_ENV, registry);
            return Ok(Some(DockerCredentials {
                username: Some(username.clone()),
                password: Some(password.clone()),
                serveraddress: Some(registry),
                ..Default::default()
            }));
        }

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        // 2. auths セクション
        if let Some(auth_entry) = config.auths.get(&registry)
            && let Some(auth_b64) = &auth_entry.auth
            && let Some(creds) = decode_auth(auth_b64, &registry)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(creds));
        }

        // 3. credential helper
        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            if let Ok(Some(creds)) = get_from_helper(helper, &registry) {
                return Ok(Some(creds));
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }
}

/// イメージ名からレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':'))
    {
        return first.to_string();
    }

    "docker.io".to_string()
}

fn decode_auth(auth_b64: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to decode auth: {}", e),
        })?;

    let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
        registry: registry.to_string(),
        message: format!("Invalid UTF-8 in auth: {}", e),
    })?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| DockerCredentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }))
}

fn get_from_helper(helper: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let helper_cmd = format!("docker-credential-{}", helper);

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to run {}: {}", helper_cmd, e),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Credential helper failed: {}", e),
        })?;

    if !output.status.success() {
        tracing::debug!(
            "Credential helper returned error for {}: {}",
            registry,
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(None);
    }

    let response: CredentialResponse =
        serde_json::from_slice(&output.stdout).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to parse credential helper response: {}", e),
        })?;

    Ok(Some(DockerCredentials {
        username: Some(response.username),
        password: Some(response.secret),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }))
}
