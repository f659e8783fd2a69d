//! 标签页比较器
//!
//! 先按容器顺序比较；同一容器内索引标签页排在最前；其余视为相等（配合稳定排序保持原相对顺序）。

use std::cmp::Ordering;
use std::sync::Arc;

use crate::order::OrderIndex;
use crate::tabs::{IndexTabMatcher, Tab};

#[derive(Clone)]
pub struct TabComparator {
    index: Arc<OrderIndex>,
    matcher: IndexTabMatcher,
}

impl TabComparator {
    pub fn new(index: Arc<OrderIndex>, matcher: IndexTabMatcher) -> Self {
        Self { index, matcher }
    }

    pub fn compare(&self, a: &Tab, b: &Tab) -> Ordering {
        self.index
            .compare(&a.container, &b.container)
            .then_with(|| {
                match (self.matcher.is_index_tab(a), self.matcher.is_index_tab(b)) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                }
            })
    }

    /// 稳定排序：比较相等的标签页保持输入顺序
    pub fn sort(&self, tabs: &mut [Tab]) {
        tabs.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::SortOrder;
    use crate::tabs::WindowId;

    fn comparator(order: &[&str]) -> TabComparator {
        TabComparator::new(
            Arc::new(OrderIndex::new(&SortOrder::new(order.iter().copied()))),
            IndexTabMatcher::default(),
        )
    }

    fn tab(id: u64, container: &str) -> Tab {
        Tab::new(id, WindowId(1), container, format!("https://example.com/{id}"))
    }

    fn index_tab(id: u64, container: &str) -> Tab {
        Tab::new(
            id,
            WindowId(1),
            container,
            format!("moz-extension://ext/index-tab/index.html?container={container}"),
        )
    }

    #[test]
    fn container_order_dominates() {
        let cmp = comparator(&["a", "b"]);
        assert_eq!(cmp.compare(&tab(1, "b"), &index_tab(2, "a")), Ordering::Greater);
        assert_eq!(cmp.compare(&index_tab(1, "b"), &tab(2, "a")), Ordering::Greater);
    }

    #[test]
    fn index_tab_first_within_container() {
        let cmp = comparator(&["a"]);
        assert_eq!(cmp.compare(&index_tab(1, "a"), &tab(2, "a")), Ordering::Less);
        assert_eq!(cmp.compare(&tab(2, "a"), &index_tab(1, "a")), Ordering::Greater);
        assert_eq!(cmp.compare(&tab(1, "a"), &tab(2, "a")), Ordering::Equal);
    }

    #[test]
    fn is_irreflexive_and_antisymmetric() {
        let cmp = comparator(&["b"]);
        let tabs = vec![tab(1, "a"), index_tab(2, "a"), tab(3, "b"), index_tab(4, "c"), tab(5, "c")];
        for a in &tabs {
            assert_eq!(cmp.compare(a, a), Ordering::Equal);
            for b in &tabs {
                assert_eq!(cmp.compare(a, b), cmp.compare(b, a).reverse());
            }
        }
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let cmp = comparator(&["a", "b"]);
        let mut tabs = vec![tab(3, "b"), tab(1, "a"), tab(4, "b"), tab(2, "a"), index_tab(5, "b")];
        cmp.sort(&mut tabs);
        let ids: Vec<u64> = tabs.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 2, 5, 3, 4]);
    }
}
