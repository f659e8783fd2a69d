//! 窗口排序规划
//!
//! 输入窗口当前标签页，输出把非固定标签页整理到目标顺序所需的移动操作。
//!
//! 当前序列与目标序列是同一组标签页的两个排列。取「目标位置」序列的最长递增子序列作为
//! 不动的元素，其余元素在目标序列中按连续段分组，每段一次移动：插入到目标中紧随其后的
//! 元素之前（该元素必然不动），没有后继则放到末尾。插入位置基于已模拟本轮先前所有移动的
//! 工作副本计算，因此各移动的目标位置不依赖宿主的实际执行顺序。

use std::collections::{HashMap, HashSet};

use crate::core::PlanError;
use crate::reconcile::TabComparator;
use crate::tabs::{MoveOperation, Tab, TabId, WindowId};

/// 单个窗口的规划结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    pub window_id: WindowId,
    pub pinned_count: usize,
    pub moves: Vec<MoveOperation>,
}

impl WindowPlan {
    pub fn is_noop(&self) -> bool {
        self.moves.is_empty()
    }
}

pub fn plan_window(window_id: WindowId, tabs: &[Tab], comparator: &TabComparator) -> Result<WindowPlan, PlanError> {
    let mut tabs = tabs.to_vec();
    tabs.sort_by_key(|t| t.index);

    let mut seen = HashSet::with_capacity(tabs.len());
    for t in &tabs {
        if !seen.insert(t.id) {
            return Err(PlanError::DuplicateTab(t.id));
        }
    }

    let (pinned, mut unpinned): (Vec<Tab>, Vec<Tab>) = tabs.into_iter().partition(|t| t.pinned);
    let pinned_count = pinned.len();
    let original: Vec<TabId> = unpinned.iter().map(|t| t.id).collect();
    comparator.sort(&mut unpinned);
    let target: Vec<TabId> = unpinned.iter().map(|t| t.id).collect();

    let moves = if original == target {
        Vec::new()
    } else {
        diff_moves(window_id, pinned_count, &original, &target)?
    };
    Ok(WindowPlan {
        window_id,
        pinned_count,
        moves,
    })
}

/// 计算把 original 变为 target 的移动序列（两者须为同一组 ID 的排列）
pub fn diff_moves(
    window_id: WindowId,
    pinned_count: usize,
    original: &[TabId],
    target: &[TabId],
) -> Result<Vec<MoveOperation>, PlanError> {
    if original.len() != target.len() {
        return Err(PlanError::MultisetMismatch);
    }
    let target_pos: HashMap<TabId, usize> = target.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let positions = original
        .iter()
        .map(|id| target_pos.get(id).copied())
        .collect::<Option<Vec<usize>>>()
        .ok_or(PlanError::MultisetMismatch)?;
    if target_pos.len() != target.len() {
        return Err(PlanError::MultisetMismatch);
    }

    let kept: HashSet<TabId> = longest_increasing(&positions)
        .into_iter()
        .map(|i| original[i])
        .collect();

    let mut working = original.to_vec();
    let mut moves = Vec::new();
    for (run, successor) in relocated_runs(target, &kept) {
        let first = working
            .iter()
            .position(|id| *id == run[0])
            .ok_or(PlanError::MultisetMismatch)?;
        let contiguous = working.get(first..first + run.len()) == Some(run);

        let members: HashSet<TabId> = run.iter().copied().collect();
        working.retain(|id| !members.contains(id));
        let at = match successor {
            Some(next) => working
                .iter()
                .position(|id| *id == next)
                .ok_or(PlanError::MultisetMismatch)?,
            None => working.len(),
        };
        working.splice(at..at, run.iter().copied());

        // 已经连续且就位：不发出空操作
        if contiguous && first == at {
            continue;
        }
        moves.push(MoveOperation {
            window_id,
            tab_ids: run.to_vec(),
            index: pinned_count + at,
        });
    }

    if working != target {
        return Err(PlanError::Diverged);
    }
    Ok(moves)
}

/// 把一次移动作用到非固定标签页序列上（与宿主语义一致），用于模拟与校验
pub fn apply_move(sequence: &mut Vec<TabId>, op: &MoveOperation, pinned_count: usize) {
    let members: HashSet<TabId> = op.tab_ids.iter().copied().collect();
    sequence.retain(|id| !members.contains(id));
    let at = op.index.saturating_sub(pinned_count).min(sequence.len());
    sequence.splice(at..at, op.tab_ids.iter().copied());
}

/// target 中由非 kept 元素组成的极大连续段，及各段在 target 中的后继
fn relocated_runs<'a>(target: &'a [TabId], kept: &HashSet<TabId>) -> Vec<(&'a [TabId], Option<TabId>)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, id) in target.iter().enumerate() {
        match (kept.contains(id), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                runs.push((&target[s..i], Some(*id)));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((&target[s..], None));
    }
    runs
}

/// 最长递增子序列的下标（升序）
///
/// 从右向左扫描，`starts[k]` 记录长度为 k+1 的递增子序列中值最大的起点。
fn longest_increasing(values: &[usize]) -> Vec<usize> {
    let n = values.len();
    let mut starts: Vec<usize> = Vec::new();
    let mut next: Vec<Option<usize>> = vec![None; n];
    for i in (0..n).rev() {
        let v = values[i];
        let len = starts.partition_point(|&s| values[s] > v);
        next[i] = len.checked_sub(1).map(|k| starts[k]);
        if len == starts.len() {
            starts.push(i);
        } else {
            starts[len] = i;
        }
    }

    let mut chain = Vec::with_capacity(starts.len());
    let mut cur = starts.last().copied();
    while let Some(i) = cur {
        chain.push(i);
        cur = next[i];
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderIndex, SortOrder};
    use crate::tabs::IndexTabMatcher;
    use std::sync::Arc;

    const W: WindowId = WindowId(1);

    fn comparator(order: &[&str]) -> TabComparator {
        TabComparator::new(
            Arc::new(OrderIndex::new(&SortOrder::new(order.iter().copied()))),
            IndexTabMatcher::default(),
        )
    }

    /// (id, container, pinned, is_index) → 按给定顺序编号的窗口快照
    fn window(specs: &[(u64, &str, bool, bool)]) -> Vec<Tab> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (id, c, pinned, is_index))| {
                let url = if *is_index {
                    format!("moz-extension://ext/index-tab/index.html?container={c}")
                } else {
                    format!("https://example.com/{id}")
                };
                let mut t = Tab::new(*id, W, *c, url);
                t.pinned = *pinned;
                t.index = i;
                t
            })
            .collect()
    }

    fn ids(v: &[u64]) -> Vec<TabId> {
        v.iter().map(|i| TabId(*i)).collect()
    }

    fn simulate(tabs: &[Tab], plan: &WindowPlan) -> Vec<TabId> {
        let mut seq: Vec<TabId> = tabs.iter().filter(|t| !t.pinned).map(|t| t.id).collect();
        for op in &plan.moves {
            apply_move(&mut seq, op, plan.pinned_count);
        }
        seq
    }

    #[test]
    fn reorders_by_container() {
        // C1, A1, B1 with order [A, B, C]
        let tabs = window(&[(3, "C", false, false), (1, "A", false, false), (2, "B", false, false)]);
        let plan = plan_window(W, &tabs, &comparator(&["A", "B", "C"])).unwrap();
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(simulate(&tabs, &plan), ids(&[1, 2, 3]));
    }

    #[test]
    fn index_tab_moves_before_its_group() {
        let tabs = window(&[(1, "A", false, false), (9, "A", false, true)]);
        let plan = plan_window(W, &tabs, &comparator(&["A"])).unwrap();
        assert_eq!(
            plan.moves,
            vec![MoveOperation { window_id: W, tab_ids: ids(&[9]), index: 0 }]
        );
    }

    #[test]
    fn pinned_prefix_offsets_indices() {
        let tabs = window(&[(100, "B", true, false), (2, "B", false, false), (1, "A", false, false)]);
        let plan = plan_window(W, &tabs, &comparator(&["A", "B"])).unwrap();
        assert_eq!(plan.pinned_count, 1);
        assert_eq!(
            plan.moves,
            vec![MoveOperation { window_id: W, tab_ids: ids(&[1]), index: 1 }]
        );
    }

    #[test]
    fn pinned_tabs_never_move() {
        let tabs = window(&[
            (100, "Z", true, false),
            (101, "A", true, false),
            (3, "B", false, false),
            (1, "A", false, false),
            (2, "Z", false, false),
        ]);
        let plan = plan_window(W, &tabs, &comparator(&["A", "B"])).unwrap();
        for op in &plan.moves {
            assert!(!op.tab_ids.contains(&TabId(100)) && !op.tab_ids.contains(&TabId(101)));
            assert!(op.index >= 2);
        }
        assert_eq!(simulate(&tabs, &plan), ids(&[1, 3, 2]));
    }

    #[test]
    fn empty_and_all_pinned_windows_plan_nothing() {
        let cmp = comparator(&["A"]);
        assert!(plan_window(W, &[], &cmp).unwrap().is_noop());
        let tabs = window(&[(1, "B", true, false), (2, "A", true, false)]);
        assert!(plan_window(W, &tabs, &cmp).unwrap().is_noop());
    }

    #[test]
    fn sorted_window_is_noop() {
        let tabs = window(&[(5, "A", false, true), (1, "A", false, false), (2, "B", false, false), (3, "B", false, false)]);
        assert!(plan_window(W, &tabs, &comparator(&["A", "B"])).unwrap().is_noop());
    }

    #[test]
    fn relocated_block_moves_as_one_run() {
        // B B B A A A → A-run moves once in front
        let tabs = window(&[
            (1, "B", false, false),
            (2, "B", false, false),
            (3, "B", false, false),
            (4, "A", false, false),
            (5, "A", false, false),
            (6, "A", false, false),
        ]);
        let plan = plan_window(W, &tabs, &comparator(&["A", "B"])).unwrap();
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].tab_ids.len(), 3);
        assert_eq!(simulate(&tabs, &plan), ids(&[4, 5, 6, 1, 2, 3]));
    }

    #[test]
    fn forward_move_does_not_double_count_run_length() {
        // A-run sits ahead of B-run it must follow
        let original = ids(&[1, 2, 3, 4, 5]);
        let target = ids(&[3, 4, 5, 1, 2]);
        let moves = diff_moves(W, 0, &original, &target).unwrap();
        assert_eq!(moves, vec![MoveOperation { window_id: W, tab_ids: ids(&[1, 2]), index: 3 }]);
    }

    #[test]
    fn converges_for_many_permutations() {
        let containers = ["A", "B", "C", "D"];
        let cmp = comparator(&["C", "A", "D"]);
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for round in 0..200 {
            let n = (round % 12) + 1;
            let specs: Vec<(u64, &str, bool, bool)> = (0..n as u64)
                .map(|id| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let c = containers[(seed >> 33) as usize % containers.len()];
                    let pinned = (seed >> 40) % 7 == 0;
                    let is_index = (seed >> 45) % 5 == 0;
                    (id, c, pinned, is_index)
                })
                .collect();
            let tabs = window(&specs);
            let plan = plan_window(W, &tabs, &cmp).unwrap();
            let after = simulate(&tabs, &plan);

            // 重新编号后再规划一次应为空
            let mut next: Vec<Tab> = tabs.iter().filter(|t| t.pinned).cloned().collect();
            for id in &after {
                next.push(tabs.iter().find(|t| t.id == *id).unwrap().clone());
            }
            for (i, t) in next.iter_mut().enumerate() {
                t.index = i;
            }
            assert!(plan_window(W, &next, &cmp).unwrap().is_noop(), "round {round}");
        }
    }

    #[test]
    fn duplicate_tab_is_an_invariant_violation() {
        let mut tabs = window(&[(1, "A", false, false), (2, "B", false, false)]);
        tabs[1].id = TabId(1);
        assert_eq!(
            plan_window(W, &tabs, &comparator(&[])).unwrap_err(),
            PlanError::DuplicateTab(TabId(1))
        );
    }

    #[test]
    fn mismatched_sequences_are_rejected() {
        assert_eq!(
            diff_moves(W, 0, &ids(&[1, 2]), &ids(&[2, 3])).unwrap_err(),
            PlanError::MultisetMismatch
        );
    }

    #[test]
    fn longest_increasing_prefers_leftmost() {
        let mut lis = longest_increasing(&[1, 0]);
        lis.sort();
        assert_eq!(lis, vec![0]);
        let mut lis = longest_increasing(&[2, 0, 1]);
        lis.sort();
        assert_eq!(lis, vec![1, 2]);
    }
}
