//! 触发面：宿主事件、周期定时器、排序表变化 → request_pass
//!
//! 触发是幂等的：驱动忙时请求被丢弃，后续任一触发都会再次尝试。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::order::SortOrder;
use crate::reconcile::Reconciler;
use crate::tabs::HostEvent;

/// 触发来源（用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    HostEvent,
    Timer,
    OrderChanged,
}

pub struct TriggerSurface {
    reconciler: Arc<Reconciler>,
    host_events: broadcast::Receiver<HostEvent>,
    order_changes: broadcast::Receiver<SortOrder>,
    interval: Option<Duration>,
    enabled: bool,
}

impl TriggerSurface {
    pub fn new(
        reconciler: Arc<Reconciler>,
        host_events: broadcast::Receiver<HostEvent>,
        order_changes: broadcast::Receiver<SortOrder>,
    ) -> Self {
        Self {
            reconciler,
            host_events,
            order_changes,
            interval: None,
            enabled: true,
        }
    }

    /// 周期触发间隔；零表示关闭
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 主循环，直到 cancel 被触发或所有事件源关闭
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = self.interval.map(|period| {
            let mut t = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            t.set_missed_tick_behavior(MissedTickBehavior::Skip);
            t
        });
        let mut host_open = true;
        let mut order_open = true;

        tracing::info!(
            enabled = self.enabled,
            interval_secs = self.interval.map(|d| d.as_secs()),
            "Trigger surface started"
        );
        loop {
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                ev = self.host_events.recv(), if host_open => match ev {
                    Ok(ev) if ev.affects_order() => Trigger::HostEvent,
                    Ok(_) => continue,
                    // 丢失的事件里可能有相关事件
                    Err(broadcast::error::RecvError::Lagged(_)) => Trigger::HostEvent,
                    Err(broadcast::error::RecvError::Closed) => {
                        host_open = false;
                        continue;
                    }
                },
                change = self.order_changes.recv(), if order_open => match change {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => Trigger::OrderChanged,
                    Err(broadcast::error::RecvError::Closed) => {
                        order_open = false;
                        continue;
                    }
                },
                _ = tick(&mut ticker) => Trigger::Timer,
            };

            if !self.enabled {
                continue;
            }
            let started = self.reconciler.request_pass().is_some();
            tracing::debug!(?trigger, started, "Reconciliation requested");
        }
        tracing::info!("Trigger surface stopped");
    }
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{SortingOrderStore, DEFAULT_STORAGE_KEY};
    use crate::storage::MemoryStore;
    use crate::tabs::{IndexTabMatcher, MemoryTabHost, Tab, TabHost, TabId, WindowId};

    const W: WindowId = WindowId(1);

    async fn setup() -> (Arc<MemoryTabHost>, Arc<SortingOrderStore>, Arc<Reconciler>) {
        let store = Arc::new(
            SortingOrderStore::load(Arc::new(MemoryStore::new()), DEFAULT_STORAGE_KEY)
                .await
                .unwrap(),
        );
        let host = Arc::new(MemoryTabHost::new());
        host.add_window(W, vec![Tab::new(1, W, "A", "u"), Tab::new(2, W, "B", "u")]);
        let reconciler = Arc::new(Reconciler::new(host.clone(), store.clone(), IndexTabMatcher::default()));
        (host, store, reconciler)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn order_change_triggers_pass() {
        let (host, store, reconciler) = setup().await;
        let surface = TriggerSurface::new(reconciler, host.subscribe(), store.subscribe());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(surface.run(cancel.clone()));

        store.set_order(SortOrder::new(["B", "A"])).await.unwrap();
        settle().await;

        assert_eq!(host.order(W), vec![TabId(2), TabId(1)]);
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn host_event_triggers_pass() {
        let (host, store, reconciler) = setup().await;
        store.set_order(SortOrder::new(["A", "B"])).await.unwrap();
        let surface = TriggerSurface::new(reconciler, host.subscribe(), store.subscribe());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(surface.run(cancel.clone()));

        host.create_tab(Tab::new(3, W, "A", "u")).unwrap();
        settle().await;

        assert_eq!(host.order(W), vec![TabId(1), TabId(3), TabId(2)]);
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_triggers_pass() {
        let (host, store, reconciler) = setup().await;
        let mut passes = reconciler.subscribe();
        let surface = TriggerSurface::new(reconciler, host.subscribe(), store.subscribe())
            .with_interval(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(surface.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(matches!(passes.try_recv(), Ok(crate::reconcile::PassEvent::Started { .. })));
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_surface_requests_nothing() {
        let (host, store, reconciler) = setup().await;
        let surface = TriggerSurface::new(reconciler, host.subscribe(), store.subscribe()).with_enabled(false);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(surface.run(cancel.clone()));

        store.set_order(SortOrder::new(["B", "A"])).await.unwrap();
        settle().await;

        assert_eq!(host.order(W), vec![TabId(1), TabId(2)]);
        assert_eq!(host.tabs_calls(), 0);
        cancel.cancel();
        task.await.unwrap();
    }
}
