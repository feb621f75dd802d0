//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。

use crate::auth::RegistryAuth;
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::StreamExt;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
    auth: RegistryAuth,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::new(),
        }
    }

    /// 認証情報マネージャーを指定して作成
    pub fn with_auth(docker: Docker, auth: RegistryAuth) -> Self {
        Self { docker, auth }
    }

    /// `image:tag` 形式の参照をプッシュ
    pub async fn push_reference(&self, reference: &str) -> BuildResult<String> {
        let (image, tag) = split_image_tag(reference);
        self.push(&image, &tag).await
    }

    /// イメージをレジストリにプッシュ
    ///
    /// # Arguments
    /// * `image` - イメージ名（レジストリ込み、タグなし）
    /// * `tag` - イメージタグ
    ///
    /// # Returns
    /// プッシュ成功時は完全なイメージ名を返す
    pub async fn push(&self, image: &str, tag: &str) -> BuildResult<String> {
        let full_image = format!("{}:{}", image, tag);

        validate_tag(tag)?;
        let credentials = self.auth.get_credentials(&full_image)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        println!("  {} {}", "↑".blue(), full_image.cyan());

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(image, Some(options), credentials);

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error {
                        error_message = Some(err);
                    } else {
                        log_progress(&full_image, &info, &mut last_status);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(err) = error_message {
            return Err(BuildError::PushFailed { message: err });
        }

        println!("  {} Pushed {}", "✓".green(), full_image);
        Ok(full_image)
    }
}

/// タグのバリデーション
///
/// Docker タグの制約:
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

/// 進捗は行単位でログに流す
fn log_progress(image: &str, info: &PushImageInfo, last_status: &mut String) {
    let Some(status) = &info.status else {
        return;
    };

    match status.as_str() {
        "Preparing" | "Waiting" | "Pushing" => {}
        "Pushed" | "Layer already exists" => {
            tracing::debug!(image, "{}", status);
        }
        _ => {
            if status != last_status {
                tracing::info!(image, "{}", status);
                *last_status = status.clone();
            }
        }
    }
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // ポート番号は / を含まない純粋な数字
        if !potential_tag.contains('/') && !potential_tag.chars().all(|c| c.is_ascii_digit()) {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}
