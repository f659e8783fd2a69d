//! 容器 ID、排序表与排名索引
//!
//! SortOrder 是去重后的容器 ID 序列；OrderIndex 在每次排序表变化时重建一次（ID → 排名），
//! 比较时 O(1) 查表。未列出的容器排在所有列出的容器之后，彼此按 ID 的自然顺序比较。

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// 宿主命名空间中的容器 ID（如 `firefox-container-3`）
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 自然顺序：前缀按字典序，尾部数字按数值，最后比较全文，保证不同 ID 永不相等
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        let (pa, na) = split_numeric_suffix(&self.0);
        let (pb, nb) = split_numeric_suffix(&other.0);
        pa.cmp(pb)
            .then_with(|| match (na, nb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => cmp_digits(a, b),
            })
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ContainerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn split_numeric_suffix(s: &str) -> (&str, Option<&str>) {
    let digits = s.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        (s, None)
    } else {
        let (prefix, suffix) = s.split_at(s.len() - digits);
        (prefix, Some(suffix))
    }
}

/// 按数值比较两个纯数字串，不限长度
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// 用户定义的容器顺序（无重复）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortOrder(Vec<ContainerId>);

impl SortOrder {
    /// 去重，保留首次出现的位置
    pub fn new<I, C>(ids: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ContainerId>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &ContainerId| seen.insert(id.clone()))
            .collect();
        Self(ids)
    }

    pub fn ids(&self) -> &[ContainerId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, id: &ContainerId) -> Option<usize> {
        self.0.iter().position(|c| c == id)
    }

    /// 将某容器移到指定位置；未列出的容器会被插入，越界位置视为末尾
    pub fn with_moved(&self, id: &ContainerId, position: usize) -> Self {
        let mut ids: Vec<ContainerId> = self.0.iter().filter(|c| *c != id).cloned().collect();
        let at = position.min(ids.len());
        ids.insert(at, id.clone());
        Self(ids)
    }

    pub fn without(&self, id: &ContainerId) -> Self {
        Self(self.0.iter().filter(|c| *c != id).cloned().collect())
    }

    pub fn into_inner(self) -> Vec<ContainerId> {
        self.0
    }
}

/// 排序表的排名索引：构建一次，比较 O(1)
#[derive(Clone, Debug, Default)]
pub struct OrderIndex {
    ranks: HashMap<ContainerId, usize>,
}

impl OrderIndex {
    pub fn new(order: &SortOrder) -> Self {
        let ranks = order
            .ids()
            .iter()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();
        Self { ranks }
    }

    pub fn rank(&self, id: &ContainerId) -> Option<usize> {
        self.ranks.get(id).copied()
    }

    /// 全序比较；对 a != b 永不返回 Equal
    pub fn compare(&self, a: &ContainerId, b: &ContainerId) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.natural_cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ContainerId {
        ContainerId::from(s)
    }

    #[test]
    fn sort_order_deduplicates_keeping_first() {
        let order = SortOrder::new(["a", "b", "a", "c", "b"]);
        assert_eq!(order.ids(), &[id("a"), id("b"), id("c")]);
    }

    #[test]
    fn listed_before_unlisted() {
        let index = OrderIndex::new(&SortOrder::new(["z"]));
        assert_eq!(index.compare(&id("z"), &id("a")), Ordering::Less);
        assert_eq!(index.compare(&id("a"), &id("z")), Ordering::Greater);
    }

    #[test]
    fn listed_follow_rank() {
        let index = OrderIndex::new(&SortOrder::new(["c", "a", "b"]));
        assert_eq!(index.compare(&id("c"), &id("a")), Ordering::Less);
        assert_eq!(index.compare(&id("b"), &id("a")), Ordering::Greater);
        assert_eq!(index.compare(&id("a"), &id("a")), Ordering::Equal);
    }

    #[test]
    fn unlisted_use_natural_order() {
        let index = OrderIndex::default();
        assert_eq!(
            index.compare(&id("firefox-container-2"), &id("firefox-container-10")),
            Ordering::Less
        );
        assert_eq!(index.compare(&id("9"), &id("10")), Ordering::Less);
        assert_eq!(index.compare(&id("10"), &id("firefox-default")), Ordering::Less);
        assert_eq!(index.compare(&id("X"), &id("Y")), Ordering::Less);
        assert_eq!(index.compare(&id("Y"), &id("X")), Ordering::Greater);
    }

    #[test]
    fn natural_order_never_equal_for_distinct_ids() {
        let ids = ["a1", "a01", "a001", "a", "1", "01", "", "b2", "a10", "1a", "9", "10"];
        for x in ids {
            for y in ids {
                let ord = id(x).natural_cmp(&id(y));
                assert_eq!(ord == Ordering::Equal, x == y, "{x} vs {y}");
                assert_eq!(ord, id(y).natural_cmp(&id(x)).reverse(), "{x} vs {y}");
            }
        }
    }

    #[test]
    fn natural_order_is_transitive() {
        let mut ids: Vec<ContainerId> = ["10", "9", "1a", "a2", "a10", "b", "a", "01"]
            .into_iter()
            .map(id)
            .collect();
        ids.sort_by(|a, b| a.natural_cmp(b));
        for i in 0..ids.len() {
            for j in i + 1..ids.len() {
                assert_eq!(ids[i].natural_cmp(&ids[j]), Ordering::Less);
            }
        }
    }

    #[test]
    fn with_moved_and_without() {
        let order = SortOrder::new(["a", "b", "c"]);
        assert_eq!(order.with_moved(&id("c"), 0).ids(), &[id("c"), id("a"), id("b")]);
        assert_eq!(order.with_moved(&id("a"), 99).ids(), &[id("b"), id("c"), id("a")]);
        assert_eq!(order.with_moved(&id("d"), 1).ids(), &[id("a"), id("d"), id("b"), id("c")]);
        assert_eq!(order.without(&id("b")).ids(), &[id("a"), id("c")]);
    }
}
