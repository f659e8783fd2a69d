//! 优雅关闭
//!
//! Ctrl+C / SIGTERM 触发 ShutdownManager 的取消令牌：触发面循环随之退出，
//! 之后 ShutdownCoordinator 在超时内依次执行清理任务（如等待进行中的整理结束）。
//! 排序表每次 set_order 都已落盘，关闭时不再回写缓存。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::core::DriverPhase;
use crate::reconcile::Reconciler;

/// 关闭信号管理器
#[derive(Clone)]
pub struct ShutdownManager {
    /// 关闭信号 token，触发面与刷新循环监听它
    shutdown_token: CancellationToken,
    /// 关闭原因广播
    reason_tx: broadcast::Sender<ShutdownReason>,
}

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM 信号
    Signal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason_tx, _) = broadcast::channel(1);
        Self {
            shutdown_token: CancellationToken::new(),
            reason_tx,
        }
    }

    /// 获取关闭 token（交给长期运行的循环）
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// 触发关闭
    pub fn shutdown(&self, reason: ShutdownReason) {
        let _ = self.reason_tx.send(reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 订阅关闭原因（需在 shutdown 之前订阅）
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.reason_tx.subscribe()
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, shutting down...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, shutting down...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭时执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 清理任务名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 关闭协调器：按注册顺序执行清理任务
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    /// 单个清理任务的超时（秒）
    timeout_secs: u64,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout_secs: 5,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    /// 依次执行清理任务；失败或超时只记日志
    pub async fn run_cleanup(&self) {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());
        let timeout = Duration::from_secs(self.timeout_secs);

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(timeout, task.cleanup()).await {
                Ok(Ok(())) => tracing::info!("Cleanup task '{}' completed", name),
                Ok(Err(e)) => tracing::warn!("Cleanup task '{}' failed: {}", name, e),
                Err(_) => tracing::warn!("Cleanup task '{}' timed out after {}s", name, self.timeout_secs),
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待进行中的整理结束，让已发出的移动有机会完成
pub struct PassDrain {
    reconciler: Arc<Reconciler>,
    poll: Duration,
}

impl PassDrain {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            poll: Duration::from_millis(50),
        }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for PassDrain {
    async fn cleanup(&self) -> anyhow::Result<()> {
        while self.reconciler.phase() == DriverPhase::Reconciling {
            tokio::time::sleep(self.poll).await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PassDrain"
    }
}

/// 运行 app 直到其结束或收到关闭信号，然后执行 cleanup
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();

    tokio::select! {
        _ = app => tracing::info!("Engine stopped"),
        _ = shutdown_manager.wait_for_shutdown() => tracing::info!("Shutdown signal received"),
    }

    cleanup().await;
}
