//! イメージ名・タグの解決

/// race ビルドのタグに付与するサフィックス
pub const RACE_SUFFIX: &str = "-race";

/// git ref から Docker タグとして使える文字列を作る（`/` → `-`）
pub fn derive_tag_from_ref(git_ref: &str) -> String {
    git_ref.replace('/', "-")
}

/// 使用するイメージタグを決定する
///
/// # Priority
/// 1. 明示的なタグ指定
/// 2. git ref から導出したタグ
/// 3. ローカルビルドで ref が空の場合は "local"
pub fn image_tag(git_ref: &str, tag: Option<&str>, local: bool) -> String {
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        return tag.to_string();
    }

    let tag = derive_tag_from_ref(git_ref);
    if local && tag.is_empty() {
        return "local".to_string();
    }
    tag
}

/// レジストリ込みのイメージ名
pub fn image_name(registry: Option<&str>, chain_name: &str) -> String {
    match registry.filter(|r| !r.is_empty()) {
        Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), chain_name),
        None => chain_name.to_string(),
    }
}

/// 付与するタグ一覧（latest 指定時は `:latest` も含む）
pub fn image_tags(image_name: &str, tag: &str, latest: bool) -> Vec<String> {
    let mut tags = vec![format!("{}:{}", image_name, tag)];
    if latest {
        tags.push(format!("{}:latest", image_name));
    }
    tags
}

/// すべてのタグに race サフィックスを付ける
pub fn race_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| format!("{}{}", tag, RACE_SUFFIX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_tag_from_branch() {
        assert_eq!(derive_tag_from_ref("release/v1.2.x"), "release-v1.2.x");
        assert_eq!(derive_tag_from_ref("v15.0.0"), "v15.0.0");
    }

    #[test]
    fn test_image_tag_priority() {
        assert_eq!(image_tag("v1.0.0", Some("custom"), false), "custom");
        assert_eq!(image_tag("v1.0.0", Some(""), false), "v1.0.0");
        assert_eq!(image_tag("feat/x", None, false), "feat-x");
        assert_eq!(image_tag("", None, true), "local");
        assert_eq!(image_tag("", None, false), "");
    }

    #[test]
    fn test_image_name_with_registry() {
        assert_eq!(image_name(Some("ghcr.io/org/"), "gaia"), "ghcr.io/org/gaia");
        assert_eq!(image_name(Some(""), "gaia"), "gaia");
        assert_eq!(image_name(None, "gaia"), "gaia");
    }

    #[test]
    fn test_image_tags_latest_and_race() {
        let tags = image_tags("ghcr.io/org/gaia", "v15.0.0", true);
        assert_eq!(
            tags,
            vec!["ghcr.io/org/gaia:v15.0.0", "ghcr.io/org/gaia:latest"]
        );

        let tags = race_tags(tags);
        assert_eq!(
            tags,
            vec![
                "ghcr.io/org/gaia:v15.0.0-race",
                "ghcr.io/org/gaia:latest-race"
            ]
        );
    }
}
