//! ビルドジョブとチェーン単位のジョブリスト

use crate::chain::ChainNodeConfig;
use std::fmt;
use std::sync::Arc;

/// 1イメージ分のビルド要求
///
/// キューに積まれた後は変更されない。
#[derive(Debug, Clone, PartialEq)]
pub struct BuildJob {
    pub chain: Arc<ChainNodeConfig>,
    /// git ref (リリースタグ or ブランチ)
    pub version: String,
    /// イメージタグの明示的な上書き
    pub tag: Option<String>,
    /// `latest` タグも付与するか
    pub latest: bool,
}

impl BuildJob {
    pub fn new(chain: Arc<ChainNodeConfig>, version: impl Into<String>) -> Self {
        Self {
            chain,
            version: version.into(),
            tag: None,
            latest: false,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = (!tag.is_empty()).then_some(tag);
        self
    }

    pub fn with_latest(mut self, latest: bool) -> Self {
        self.latest = latest;
        self
    }

    pub fn chain_name(&self) -> &str {
        &self.chain.name
    }
}

impl fmt::Display for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.chain.name, self.version)
    }
}

/// 1チェーン分のジョブ列（新しいリリースが先頭）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainJobList {
    jobs: Vec<BuildJob>,
}

impl ChainJobList {
    pub fn new() -> Self {
        Self::default()
    }

    /// リリースタグ列（新しい順）からジョブ列を作る。先頭が latest になる。
    pub fn from_releases<I, S>(chain: Arc<ChainNodeConfig>, releases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        releases
            .into_iter()
            .enumerate()
            .map(|(i, version)| BuildJob::new(chain.clone(), version).with_latest(i == 0))
            .collect()
    }

    pub fn push(&mut self, job: BuildJob) {
        self.jobs.push(job);
    }

    pub fn get(&self, position: usize) -> Option<&BuildJob> {
        self.jobs.get(position)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildJob> {
        self.jobs.iter()
    }
}

impl FromIterator<BuildJob> for ChainJobList {
    fn from_iter<T: IntoIterator<Item = BuildJob>>(iter: T) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<BuildJob>> for ChainJobList {
    fn from(jobs: Vec<BuildJob>) -> Self {
        Self { jobs }
    }
}

impl<'a> IntoIterator for &'a ChainJobList {
    type Item = &'a BuildJob;
    type IntoIter = std::slice::Iter<'a, BuildJob>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_releases_marks_first_latest() {
        let chain = Arc::new(ChainNodeConfig::new("gaia"));
        let list = ChainJobList::from_releases(chain, ["v15.0.0", "v14.1.0", "v14.0.0"]);

        assert_eq!(list.len(), 3);
        let latest: Vec<bool> = list.iter().map(|job| job.latest).collect();
        assert_eq!(latest, vec![true, false, false]);
        assert_eq!(list.get(1).unwrap().version, "v14.1.0");
    }

    #[test]
    fn test_empty_tag_override_is_ignored() {
        let chain = Arc::new(ChainNodeConfig::new("gaia"));
        let job = BuildJob::new(chain.clone(), "main").with_tag("");
        assert_eq!(job.tag, None);

        let job = BuildJob::new(chain, "main").with_tag("nightly");
        assert_eq!(job.tag.as_deref(), Some("nightly"));
        assert_eq!(job.to_string(), "gaia@main");
    }
}
