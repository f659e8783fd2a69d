//! 驱动状态与整理结果
//!
//! DriverPhase 是单次飞行（single-flight）守卫的两态；PassReport / WindowOutcome 汇总一轮整理，
//! 随 PassEvent::Ended 对外广播。

use serde::Serialize;

use crate::tabs::WindowId;

/// 驱动阶段：同一时刻至多一轮整理在进行
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    Idle,
    Reconciling,
}

/// 单个窗口的整理结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WindowOutcome {
    /// 已是目标顺序
    InOrder { window_id: WindowId },
    /// 发出了移动；部分可能失败或超时
    Moved {
        window_id: WindowId,
        applied: usize,
        failed: usize,
        timed_out: usize,
    },
    /// 查询失败或规划不变量被破坏，本轮跳过
    Skipped { window_id: WindowId, reason: String },
}

/// 一轮整理的汇总
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub windows: usize,
    pub moves_planned: usize,
    pub moves_applied: usize,
    pub moves_failed: usize,
    pub moves_timed_out: usize,
    pub windows_skipped: usize,
    pub duration_ms: u64,
}

impl PassReport {
    pub fn record(&mut self, outcome: &WindowOutcome) {
        self.windows += 1;
        match outcome {
            WindowOutcome::InOrder { .. } => {}
            WindowOutcome::Moved {
                applied,
                failed,
                timed_out,
                ..
            } => {
                self.moves_planned += applied + failed + timed_out;
                self.moves_applied += applied;
                self.moves_failed += failed;
                self.moves_timed_out += timed_out;
            }
            WindowOutcome::Skipped { .. } => self.windows_skipped += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.moves_failed == 0 && self.moves_timed_out == 0 && self.windows_skipped == 0
    }
}
