//! 宿主标签页 API 抽象
//!
//! 浏览器（或测试替身）实现 TabHost：枚举窗口、列出窗口内标签页、批量移动一段标签页，
//! 并通过 broadcast 推送标签页生命周期事件（供触发面使用）。

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::HostError;
use crate::tabs::{MoveOperation, Tab, TabId, WindowId};

/// 宿主 API：所有调用都可能任意延迟或失败
#[async_trait]
pub trait TabHost: Send + Sync {
    /// 当前打开的全部窗口
    async fn windows(&self) -> Result<Vec<WindowId>, HostError>;

    /// 窗口内全部标签页（含固定标签页），按位置排序
    async fn tabs(&self, window: WindowId) -> Result<Vec<Tab>, HostError>;

    /// 执行一次移动；语义见 MoveOperation
    async fn move_tabs(&self, op: &MoveOperation) -> Result<(), HostError>;

    /// 订阅标签页 / 窗口生命周期事件
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}

/// 宿主推送的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    TabCreated { window_id: WindowId, tab_id: TabId },
    TabRemoved { window_id: WindowId, tab_id: TabId },
    TabMoved { window_id: WindowId, tab_id: TabId },
    TabAttached { window_id: WindowId, tab_id: TabId },
    /// 仅列出发生变化的字段
    TabUpdated {
        tab_id: TabId,
        pinned: Option<bool>,
        url: Option<String>,
        title: Option<String>,
    },
    WindowRemoved { window_id: WindowId },
}

impl HostEvent {
    /// 该事件是否可能改变目标顺序或当前顺序
    pub fn affects_order(&self) -> bool {
        match self {
            HostEvent::TabUpdated { pinned, url, .. } => pinned.is_some() || url.is_some(),
            HostEvent::WindowRemoved { .. } => false,
            _ => true,
        }
    }
}
