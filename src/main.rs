//! Tabsort - 容器标签页排序引擎
//!
//! 入口：初始化日志、加载配置与排序表，启动整理驱动与触发面，直到收到关闭信号。
//! 未接入真实浏览器时使用进程内宿主，预置一个演示窗口。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tabsort::config::load_config;
use tabsort::core::shutdown::{run_with_graceful_shutdown, PassDrain};
use tabsort::core::{ShutdownCoordinator, ShutdownManager};
use tabsort::storage::JsonFileStore;
use tabsort::tabs::{IndexTabMatcher, MemoryTabHost, Tab, TabHost, WindowId};
use tabsort::{observability, Reconciler, SortingOrderStore, TriggerSurface};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let kv = Arc::new(
        JsonFileStore::open(&cfg.order.storage_path)
            .await
            .with_context(|| format!("Failed to open {}", cfg.order.storage_path.display()))?,
    );
    let store = Arc::new(
        SortingOrderStore::load(kv.clone(), cfg.order.storage_key.clone())
            .await
            .context("Failed to load sort order")?,
    );
    let _listener = store.spawn_change_listener();

    let matcher = IndexTabMatcher::new(&cfg.index_tab.url_pattern).context("Invalid index_tab.url_pattern")?;

    let host = Arc::new(MemoryTabHost::new());
    seed_demo_window(&host);

    let reconciler = Arc::new(
        Reconciler::new(host.clone(), store.clone(), matcher)
            .with_move_timeout(cfg.reconcile.move_timeout())
            .with_slow_pass_warn(cfg.reconcile.slow_pass_warn()),
    );

    let shutdown = Arc::new(ShutdownManager::new());
    let token = shutdown.token();

    // 观察其他进程对排序表文件的修改
    let refresh_every = cfg.order.refresh_interval();
    if !refresh_every.is_zero() {
        tokio::spawn(refresh_loop(kv.clone(), refresh_every, token.clone()));
    }

    let surface = TriggerSurface::new(reconciler.clone(), host.subscribe(), store.subscribe())
        .with_interval(cfg.reconcile.interval())
        .with_enabled(cfg.reconcile.enabled);

    if cfg.reconcile.enabled {
        let _ = reconciler.request_pass();
    }

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(PassDrain::new(reconciler.clone()));
    let mut reasons = shutdown.subscribe();

    tracing::info!(
        name = cfg.app.name.as_deref().unwrap_or("tabsort"),
        storage = %kv.path().display(),
        "Tab ordering engine running"
    );
    run_with_graceful_shutdown(shutdown, surface.run(token), move || async move {
        coordinator.run_cleanup().await;
    })
    .await;

    if let Ok(reason) = reasons.try_recv() {
        tracing::info!(reason = ?reason, "Tab ordering engine stopped");
    }
    Ok(())
}

async fn refresh_loop(kv: Arc<JsonFileStore>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = kv.refresh().await {
                    tracing::warn!(error = %e, "Failed to refresh sort order storage");
                }
            }
        }
    }
}

fn seed_demo_window(host: &MemoryTabHost) {
    let w = WindowId(1);
    host.add_window(
        w,
        vec![
            Tab::new(1, w, "firefox-default", "https://www.rust-lang.org/").pinned(),
            Tab::new(2, w, "firefox-container-2", "https://docs.rs/"),
            Tab::new(3, w, "firefox-container-1", "https://crates.io/"),
            Tab::new(
                4,
                w,
                "firefox-container-1",
                "moz-extension://tabsort/index-tab/index.html?container=firefox-container-1",
            ),
            Tab::new(5, w, "firefox-container-2", "https://github.com/"),
            Tab::new(6, w, "firefox-default", "https://developer.mozilla.org/"),
        ],
    );
}
