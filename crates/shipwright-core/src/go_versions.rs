//! Go ツールチェーンのバージョン解決
//!
//! go.mod の `go` ディレクティブ（`1.21` や `1.21.4`）から、
//! golang 公式 alpine イメージのタグを決める。

pub const DEFAULT_ALPINE_VERSION: &str = "3.20";

/// (major.minor, フルバージョン) の対応表。新しい順。
pub const GO_VERSIONS: &[(&str, &str)] = &[
    ("1.23", "1.23.6"),
    ("1.22", "1.22.12"),
    ("1.21", "1.21.13"),
    ("1.20", "1.20.14"),
    ("1.19", "1.19.13"),
    ("1.18", "1.18.10"),
];

/// go.mod が解決できない場合に使うバージョン
pub const DEFAULT_GO_VERSION: &str = GO_VERSIONS[0].1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GoVersion {
    /// フルバージョン（例: 1.21.13）
    pub version: String,
    /// ベースイメージのタグ（例: 1.21.13-alpine3.20）
    pub image: String,
}

impl GoVersion {
    fn new(version: &str, alpine: &str) -> Self {
        Self {
            version: version.to_string(),
            image: format!("{}-alpine{}", version, alpine),
        }
    }

    /// 要求バージョンの major.minor に一致するツールチェーンを返す
    ///
    /// 一致しなければデフォルト（最新）を返す。
    pub fn for_go_version(go_version: &str, alpine_version: Option<&str>) -> Self {
        let alpine = alpine_version
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_ALPINE_VERSION);
        let wanted = major_minor(go_version.trim_start_matches("go"));

        let version = GO_VERSIONS
            .iter()
            .find(|(minor, _)| Some(*minor) == wanted)
            .map(|(_, full)| *full)
            .unwrap_or(DEFAULT_GO_VERSION);

        Self::new(version, alpine)
    }
}

/// "1.21.4" → "1.21"
fn major_minor(version: &str) -> Option<&str> {
    let mut dots = version.match_indices('.');
    let (first, _) = dots.next()?;
    match dots.next() {
        Some((second, _)) => Some(&version[..second]),
        None if first + 1 < version.len() => Some(version),
        None => None,
    }
}
