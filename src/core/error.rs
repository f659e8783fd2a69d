//! 错误类型
//!
//! 存储、排序表、宿主 API、排序规划各一类；驱动层按窗口粒度吞掉 HostError / PlanError，
//! 只有 StoreError / OrderError 会传播给 get_order / set_order 的调用方。

use thiserror::Error;

use crate::tabs::{TabId, WindowId};

/// 键值存储失败（读写文件、序列化、后端不可用）
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// 排序表（Sorting Order Store）错误
#[derive(Error, Debug)]
pub enum OrderError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// 持久化的值不是容器 ID 列表
    #[error("Malformed sort order: {0}")]
    Malformed(String),
}

/// 宿主标签页 API 错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Host rejected operation: {0}")]
    Rejected(String),

    /// 由驱动层的超时包装产生，宿主端操作可能仍在进行
    #[error("Host operation timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// 规划不变量被破坏（理论上不可达；出现时跳过该窗口）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Duplicate tab in window snapshot: {0}")]
    DuplicateTab(TabId),

    #[error("Target order is not a permutation of the current order")]
    MultisetMismatch,

    #[error("Simulated moves did not reach the target order")]
    Diverged,
}
