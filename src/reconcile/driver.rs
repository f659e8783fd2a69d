//! 整理驱动（Reconciler）
//!
//! 两态机 Idle / Reconciling：忙时到来的请求直接丢弃而非排队，靠触发面的后续事件重试。
//! 一轮整理内各窗口完全并发；每个移动操作单独施加超时，失败只影响所在窗口，
//! 不回滚、不重试，由下一轮重新比对实际状态来收敛。

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::core::{DriverPhase, HostError, PassReport, WindowOutcome};
use crate::order::SortingOrderStore;
use crate::reconcile::{plan_window, PassEvent, TabComparator};
use crate::tabs::{IndexTabMatcher, MoveOperation, TabHost, WindowId};

pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SLOW_PASS_WARN: Duration = Duration::from_millis(500);

enum MoveResult {
    Applied,
    Failed(HostError),
    TimedOut,
}

/// 持有 Reconciling 状态；drop 时回到 Idle（包括整理任务 panic 的情况）
struct PassGuard {
    phase: Arc<Mutex<DriverPhase>>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = DriverPhase::Idle;
    }
}

pub struct Reconciler {
    host: Arc<dyn TabHost>,
    order: Arc<SortingOrderStore>,
    matcher: IndexTabMatcher,
    move_timeout: Duration,
    slow_pass_warn: Duration,
    phase: Arc<Mutex<DriverPhase>>,
    events_tx: broadcast::Sender<PassEvent>,
}

impl Reconciler {
    pub fn new(host: Arc<dyn TabHost>, order: Arc<SortingOrderStore>, matcher: IndexTabMatcher) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            host,
            order,
            matcher,
            move_timeout: DEFAULT_MOVE_TIMEOUT,
            slow_pass_warn: DEFAULT_SLOW_PASS_WARN,
            phase: Arc::new(Mutex::new(DriverPhase::Idle)),
            events_tx,
        }
    }

    pub fn with_move_timeout(mut self, move_timeout: Duration) -> Self {
        self.move_timeout = move_timeout;
        self
    }

    pub fn with_slow_pass_warn(mut self, threshold: Duration) -> Self {
        self.slow_pass_warn = threshold;
        self
    }

    pub fn phase(&self) -> DriverPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// onPassStarted / onPassEnded
    pub fn subscribe(&self) -> broadcast::Receiver<PassEvent> {
        self.events_tx.subscribe()
    }

    /// 请求一轮整理（fire-and-forget）；正在整理时返回 None，请求被丢弃
    pub fn request_pass(self: &Arc<Self>) -> Option<JoinHandle<PassReport>> {
        let guard = self.try_begin()?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.execute(guard).await }))
    }

    /// 就地执行一轮整理并等待结束；正在整理时返回 None
    pub async fn run_pass(&self) -> Option<PassReport> {
        let guard = self.try_begin()?;
        Some(self.execute(guard).await)
    }

    fn try_begin(&self) -> Option<PassGuard> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if *phase == DriverPhase::Reconciling {
            tracing::debug!("Reconciliation already in flight, request dropped");
            return None;
        }
        *phase = DriverPhase::Reconciling;
        Some(PassGuard {
            phase: Arc::clone(&self.phase),
        })
    }

    async fn execute(&self, guard: PassGuard) -> PassReport {
        let pass_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let _ = self.events_tx.send(PassEvent::Started {
            pass_id: pass_id.clone(),
            at: chrono::Utc::now(),
        });

        // 排名索引在整轮中保持同一快照
        let comparator = TabComparator::new(self.order.index(), self.matcher.clone());
        let windows = match self.host.windows().await {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!(pass_id = %pass_id, error = %e, "Failed to enumerate windows");
                Vec::new()
            }
        };
        tracing::debug!(pass_id = %pass_id, windows = windows.len(), "Reconciliation pass started");

        let outcomes = join_all(
            windows
                .iter()
                .map(|window_id| self.reconcile_window(*window_id, &comparator)),
        )
        .await;

        let mut report = PassReport::default();
        for outcome in &outcomes {
            report.record(outcome);
        }
        let elapsed = started.elapsed();
        report.duration_ms = millis(elapsed);

        if elapsed > self.slow_pass_warn {
            tracing::warn!(
                pass_id = %pass_id,
                duration_ms = report.duration_ms,
                windows = report.windows,
                "Reconciliation pass was slow"
            );
        }
        tracing::info!(
            pass_id = %pass_id,
            windows = report.windows,
            moves = report.moves_planned,
            failed = report.moves_failed + report.moves_timed_out,
            duration_ms = report.duration_ms,
            "Reconciliation pass finished"
        );
        let _ = self.events_tx.send(PassEvent::Ended {
            pass_id,
            at: chrono::Utc::now(),
            duration_ms: report.duration_ms,
            report: report.clone(),
        });
        drop(guard);
        report
    }

    async fn reconcile_window(&self, window_id: WindowId, comparator: &TabComparator) -> WindowOutcome {
        let tabs = match self.host.tabs(window_id).await {
            Ok(tabs) => tabs,
            Err(e) => {
                tracing::warn!(window_id = %window_id, error = %e, "Failed to query window tabs");
                return WindowOutcome::Skipped {
                    window_id,
                    reason: e.to_string(),
                };
            }
        };

        let plan = match plan_window(window_id, &tabs, comparator) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(window_id = %window_id, error = %e, "Planning invariant violated, window skipped");
                return WindowOutcome::Skipped {
                    window_id,
                    reason: e.to_string(),
                };
            }
        };
        if plan.is_noop() {
            return WindowOutcome::InOrder { window_id };
        }

        // 全部发出后一起等待
        let results = join_all(plan.moves.iter().map(|op| self.apply_move(op))).await;

        let (mut applied, mut failed, mut timed_out) = (0, 0, 0);
        for result in results {
            match result {
                MoveResult::Applied => applied += 1,
                MoveResult::Failed(_) => failed += 1,
                MoveResult::TimedOut => timed_out += 1,
            }
        }
        if failed + timed_out > 0 {
            tracing::warn!(
                window_id = %window_id,
                failed,
                timed_out,
                "Some tab moves did not complete; window left for the next pass"
            );
        }
        WindowOutcome::Moved {
            window_id,
            applied,
            failed,
            timed_out,
        }
    }

    async fn apply_move(&self, op: &MoveOperation) -> MoveResult {
        let start = Instant::now();
        let result = match timeout(self.move_timeout, self.host.move_tabs(op)).await {
            Ok(Ok(())) => MoveResult::Applied,
            Ok(Err(e)) => MoveResult::Failed(e),
            Err(_) => MoveResult::TimedOut,
        };

        let outcome = match &result {
            MoveResult::Applied => "ok",
            MoveResult::Failed(_) => "error",
            MoveResult::TimedOut => "timeout",
        };
        let error = match &result {
            MoveResult::Failed(e) => Some(e.to_string()),
            MoveResult::TimedOut => Some(
                HostError::Timeout {
                    secs: self.move_timeout.as_secs(),
                }
                .to_string(),
            ),
            MoveResult::Applied => None,
        };
        let audit = serde_json::json!({
            "event": "tab_move",
            "window_id": op.window_id.0,
            "tab_ids": op.tab_ids.iter().map(|t| t.0).collect::<Vec<_>>(),
            "index": op.index,
            "outcome": outcome,
            "error": error,
            "duration_ms": millis(start.elapsed()),
        });
        tracing::debug!(audit = %audit, "move");
        result
    }
}

/// 毫秒数，超出 u64 时饱和
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
