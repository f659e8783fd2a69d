//! 标签页快照、移动操作与宿主 API 抽象
//!
//! - **host**: TabHost trait（窗口枚举、标签页查询、批量移动）与宿主事件
//! - **index_tab**: 索引标签页 URL 识别
//! - **memory**: 进程内宿主实现（测试与演示用）

pub mod host;
pub mod index_tab;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::order::ContainerId;

pub use host::{HostEvent, TabHost};
pub use index_tab::IndexTabMatcher;
pub use memory::MemoryTabHost;

/// 宿主分配的标签页 ID
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 宿主分配的窗口 ID
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个标签页的只读快照；每轮整理都重新从宿主获取
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    /// 在窗口中的绝对位置（含固定标签页）
    pub index: usize,
    pub container: ContainerId,
    pub pinned: bool,
    pub url: String,
}

impl Tab {
    pub fn new(id: u64, window_id: WindowId, container: impl Into<ContainerId>, url: impl Into<String>) -> Self {
        Self {
            id: TabId(id),
            window_id,
            index: 0,
            container: container.into(),
            pinned: false,
            url: url.into(),
        }
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// 把一段连续的标签页（保持内部顺序）移到窗口内的目标位置
///
/// `index` 是移动完成后这段标签页首个元素所在的绝对位置（已含固定标签页前缀）。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub window_id: WindowId,
    pub tab_ids: Vec<TabId>,
    pub index: usize,
}
