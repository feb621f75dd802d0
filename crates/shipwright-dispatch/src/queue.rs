//! ジョブキューと公平な線形化
//!
//! ラウンド r ごとに、各チェーンの r 番目のジョブをチェーン順に並べる。
//! どのチェーンも2つ目のジョブより先に、全チェーンの最新ジョブが着手される。

use shipwright_core::{BuildJob, ChainJobList};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct JobQueue {
    lists: Vec<ChainJobList>,
    /// 線形化済みの (リスト番号, リスト内の位置)
    order: Vec<(usize, usize)>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, list: ChainJobList) {
        self.lists.push(list);
        self.relinearize();
    }

    pub fn extend<I: IntoIterator<Item = ChainJobList>>(&mut self, lists: I) {
        self.lists.extend(lists);
        self.relinearize();
    }

    fn relinearize(&mut self) {
        let rounds = self.lists.iter().map(ChainJobList::len).max().unwrap_or(0);
        let mut order = Vec::with_capacity(self.lists.iter().map(ChainJobList::len).sum());

        for round in 0..rounds {
            for (list_index, list) in self.lists.iter().enumerate() {
                if round < list.len() {
                    order.push((list_index, round));
                }
            }
        }

        self.order = order;
    }

    /// 線形化した順序で `index` 番目のジョブ
    ///
    /// `index >= len()` なら `None`。一度 `None` を返した位置以降は常に `None`。
    pub fn get(&self, index: usize) -> Option<&BuildJob> {
        let &(list, position) = self.order.get(index)?;
        self.lists[list].get(position)
    }

    /// 全ジョブ数
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// チェーン（ジョブリスト）の数
    pub fn chain_count(&self) -> usize {
        self.lists.len()
    }

    /// 線形化した順序で全ジョブを走査する
    pub fn iter(&self) -> impl Iterator<Item = &BuildJob> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl FromIterator<ChainJobList> for JobQueue {
    fn from_iter<T: IntoIterator<Item = ChainJobList>>(iter: T) -> Self {
        let mut queue = JobQueue::new();
        queue.extend(iter);
        queue
    }
}

/// ワーカー間で共有する取得位置
///
/// `claim` はロック内で読み取りとインクリメントを行うため、
/// 各インデックスはちょうど1回だけ払い出される。
#[derive(Debug, Default)]
pub struct ClaimCursor {
    next_index: Mutex<usize>,
}

impl ClaimCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self) -> usize {
        let mut next = self
            .next_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let index = *next;
        *next += 1;
        index
    }

    /// これまでに払い出した数
    pub fn claimed(&self) -> usize {
        *self
            .next_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_core::ChainNodeConfig;
    use std::sync::Arc;

    fn list(chain: &str, versions: &[&str]) -> ChainJobList {
        let chain = Arc::new(ChainNodeConfig::new(chain));
        ChainJobList::from_releases(chain, versions.iter().copied())
    }

    fn labels(queue: &JobQueue) -> Vec<String> {
        queue
            .iter()
            .map(|job| format!("{}-{}", job.chain_name(), job.version))
            .collect()
    }

    #[test]
    fn test_round_robin_by_round() {
        let queue: JobQueue = [list("A", &["v3", "v2", "v1"]), list("B", &["v5"])]
            .into_iter()
            .collect();

        assert_eq!(queue.len(), 4);
        assert_eq!(labels(&queue), vec!["A-v3", "B-v5", "A-v2", "A-v1"]);
    }

    #[test]
    fn test_first_round_is_each_chains_latest() {
        let queue: JobQueue = [
            list("A", &["a2", "a1"]),
            list("B", &["b3", "b2", "b1"]),
            list("C", &["c1"]),
        ]
        .into_iter()
        .collect();

        let first: Vec<&BuildJob> = (0..queue.chain_count())
            .map(|i| queue.get(i).unwrap())
            .collect();
        let chains: Vec<&str> = first.iter().map(|job| job.chain_name()).collect();
        assert_eq!(chains, vec!["A", "B", "C"]);
        assert!(first.iter().all(|job| job.latest));
    }

    #[test]
    fn test_empty_lists_are_skipped() {
        let queue: JobQueue = [
            ChainJobList::new(),
            list("A", &["v2", "v1"]),
            ChainJobList::new(),
            list("B", &["v9"]),
        ]
        .into_iter()
        .collect();

        assert_eq!(queue.chain_count(), 4);
        assert_eq!(labels(&queue), vec!["A-v2", "B-v9", "A-v1"]);
    }

    #[test]
    fn test_empty_queue() {
        let queue = JobQueue::new();
        assert!(queue.is_empty());
        assert!(queue.get(0).is_none());

        let queue: JobQueue = [ChainJobList::new()].into_iter().collect();
        assert!(queue.get(0).is_none());
    }

    #[test]
    fn test_get_is_monotone_terminating() {
        let mut queue = JobQueue::new();
        queue.push(list("A", &["v2", "v1"]));
        queue.push(list("B", &["v1"]));

        let first_none = (0..).find(|&i| queue.get(i).is_none()).unwrap();
        assert_eq!(first_none, queue.len());
        assert!((first_none..first_none + 16).all(|i| queue.get(i).is_none()));
    }

    #[test]
    fn test_push_after_push_relinearizes() {
        let mut queue = JobQueue::new();
        queue.push(list("A", &["v3", "v2"]));
        assert_eq!(labels(&queue), vec!["A-v3", "A-v2"]);

        queue.push(list("B", &["v5"]));
        assert_eq!(labels(&queue), vec!["A-v3", "B-v5", "A-v2"]);
    }

    #[test]
    fn test_cursor_is_strictly_increasing() {
        let cursor = Arc::new(ClaimCursor::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cursor = cursor.clone();
                std::thread::spawn(move || (0..100).map(|_| cursor.claim()).collect::<Vec<_>>())
            })
            .collect();

        let mut claimed: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        claimed.sort_unstable();

        assert_eq!(claimed, (0..800).collect::<Vec<_>>());
        assert_eq!(cursor.claimed(), 800);
    }
}
