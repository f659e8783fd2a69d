//! Tabsort - 容器标签页排序引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、驱动状态、优雅关闭
//! - **observability**: 日志初始化
//! - **order**: 容器 ID、排序表与持久化的 Sorting Order Store
//! - **reconcile**: 比较器、窗口差分规划、整理驱动、触发面
//! - **storage**: 带变更通知的键值存储（内存 / JSON 文件）
//! - **tabs**: 标签页快照、移动操作、宿主 API 抽象与进程内宿主

pub mod config;
pub mod core;
pub mod observability;
pub mod order;
pub mod reconcile;
pub mod storage;
pub mod tabs;

pub use order::{ContainerId, SortOrder, SortingOrderStore};
pub use reconcile::{Reconciler, TriggerSurface};
