//! 进程内宿主（用于测试与演示，无需浏览器）
//!
//! 每个窗口是一个有序的标签页列表，固定标签页始终位于前缀；支持注入延迟、按窗口失败
//! （整个窗口或只有移动）、窗口枚举失败、移动挂起（用于超时测试），并统计调用次数。

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::HostError;
use crate::tabs::{HostEvent, MoveOperation, Tab, TabHost, TabId, WindowId};

pub struct MemoryTabHost {
    windows: Mutex<BTreeMap<WindowId, Vec<Tab>>>,
    latency: Mutex<Option<Duration>>,
    failing_windows: Mutex<HashSet<WindowId>>,
    failing_moves: Mutex<HashSet<WindowId>>,
    fail_enumeration: AtomicBool,
    hang_moves: AtomicBool,
    move_calls: AtomicUsize,
    tabs_calls: AtomicUsize,
    events_tx: broadcast::Sender<HostEvent>,
}

impl MemoryTabHost {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            windows: Mutex::new(BTreeMap::new()),
            latency: Mutex::new(None),
            failing_windows: Mutex::new(HashSet::new()),
            failing_moves: Mutex::new(HashSet::new()),
            fail_enumeration: AtomicBool::new(false),
            hang_moves: AtomicBool::new(false),
            move_calls: AtomicUsize::new(0),
            tabs_calls: AtomicUsize::new(0),
            events_tx,
        }
    }

    /// 添加窗口；固定标签页被稳定地前移，index 按最终位置重写
    pub fn add_window(&self, window_id: WindowId, tabs: Vec<Tab>) {
        let (mut pinned, unpinned): (Vec<Tab>, Vec<Tab>) = tabs.into_iter().partition(|t| t.pinned);
        pinned.extend(unpinned);
        for t in pinned.iter_mut() {
            t.window_id = window_id;
        }
        renumber(&mut pinned);
        self.lock_windows().insert(window_id, pinned);
    }

    /// 在窗口末尾（固定标签页则在固定前缀末尾）创建标签页
    pub fn create_tab(&self, mut tab: Tab) -> Result<(), HostError> {
        let window_id = tab.window_id;
        let tab_id = tab.id;
        {
            let mut windows = self.lock_windows();
            let tabs = windows
                .get_mut(&window_id)
                .ok_or(HostError::WindowNotFound(window_id))?;
            let at = if tab.pinned { pinned_count(tabs) } else { tabs.len() };
            tab.window_id = window_id;
            tabs.insert(at, tab);
            renumber(tabs);
        }
        let _ = self.events_tx.send(HostEvent::TabCreated { window_id, tab_id });
        Ok(())
    }

    pub fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        let window_id = {
            let mut windows = self.lock_windows();
            let (window_id, tabs) = windows
                .iter_mut()
                .find(|(_, tabs)| tabs.iter().any(|t| t.id == tab_id))
                .ok_or(HostError::TabNotFound(tab_id))?;
            tabs.retain(|t| t.id != tab_id);
            renumber(tabs);
            *window_id
        };
        let _ = self.events_tx.send(HostEvent::TabRemoved { window_id, tab_id });
        Ok(())
    }

    /// 固定 / 取消固定：固定后移到固定前缀末尾，取消后移到紧随固定前缀之后
    pub fn set_pinned(&self, tab_id: TabId, pinned: bool) -> Result<(), HostError> {
        self.update_tab(tab_id, |tabs, pos| {
            if tabs[pos].pinned == pinned {
                return false;
            }
            let mut tab = tabs.remove(pos);
            tab.pinned = pinned;
            let at = pinned_count(tabs);
            tabs.insert(at, tab);
            true
        })?;
        let _ = self.events_tx.send(HostEvent::TabUpdated {
            tab_id,
            pinned: Some(pinned),
            url: None,
            title: None,
        });
        Ok(())
    }

    pub fn set_url(&self, tab_id: TabId, url: impl Into<String>) -> Result<(), HostError> {
        let url = url.into();
        let new_url = url.clone();
        self.update_tab(tab_id, move |tabs, pos| {
            tabs[pos].url = new_url;
            true
        })?;
        let _ = self.events_tx.send(HostEvent::TabUpdated {
            tab_id,
            pinned: None,
            url: Some(url),
            title: None,
        });
        Ok(())
    }

    /// 窗口内标签页 ID 的当前顺序
    pub fn order(&self, window_id: WindowId) -> Vec<TabId> {
        self.lock_windows()
            .get(&window_id)
            .map(|tabs| tabs.iter().map(|t| t.id).collect())
            .unwrap_or_default()
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// 令该窗口的所有查询与移动返回 Rejected
    pub fn fail_window(&self, window_id: WindowId) {
        self.failing_windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(window_id);
    }

    /// 只令该窗口的移动返回 Rejected，查询照常
    pub fn fail_moves(&self, window_id: WindowId) {
        self.failing_moves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(window_id);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// 令移动调用永不完成（超时测试）
    pub fn hang_moves(&self, hang: bool) {
        self.hang_moves.store(hang, Ordering::SeqCst);
    }

    pub fn move_calls(&self) -> usize {
        self.move_calls.load(Ordering::SeqCst)
    }

    pub fn tabs_calls(&self) -> usize {
        self.tabs_calls.load(Ordering::SeqCst)
    }

    fn lock_windows(&self) -> std::sync::MutexGuard<'_, BTreeMap<WindowId, Vec<Tab>>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_tab<F>(&self, tab_id: TabId, f: F) -> Result<(), HostError>
    where
        F: FnOnce(&mut Vec<Tab>, usize) -> bool,
    {
        let mut windows = self.lock_windows();
        for tabs in windows.values_mut() {
            if let Some(pos) = tabs.iter().position(|t| t.id == tab_id) {
                if f(tabs, pos) {
                    renumber(tabs);
                }
                return Ok(());
            }
        }
        Err(HostError::TabNotFound(tab_id))
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }

    fn check_window(&self, window_id: WindowId) -> Result<(), HostError> {
        let failing = self.failing_windows.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(&window_id) {
            return Err(HostError::Rejected(format!("window {window_id} is unavailable")));
        }
        Ok(())
    }
}

impl Default for MemoryTabHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabHost for MemoryTabHost {
    async fn windows(&self) -> Result<Vec<WindowId>, HostError> {
        self.simulate_latency().await;
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("window enumeration failed".to_string()));
        }
        Ok(self.lock_windows().keys().copied().collect())
    }

    async fn tabs(&self, window: WindowId) -> Result<Vec<Tab>, HostError> {
        self.tabs_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_window(window)?;
        self.lock_windows()
            .get(&window)
            .cloned()
            .ok_or(HostError::WindowNotFound(window))
    }

    async fn move_tabs(&self, op: &MoveOperation) -> Result<(), HostError> {
        self.move_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_moves.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.simulate_latency().await;
        self.check_window(op.window_id)?;
        if self
            .failing_moves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&op.window_id)
        {
            return Err(HostError::Rejected(format!("moves in window {} are rejected", op.window_id)));
        }
        {
            let mut windows = self.lock_windows();
            let tabs = windows
                .get_mut(&op.window_id)
                .ok_or(HostError::WindowNotFound(op.window_id))?;
            for id in &op.tab_ids {
                let tab = tabs
                    .iter()
                    .find(|t| t.id == *id)
                    .ok_or(HostError::TabNotFound(*id))?;
                if tab.pinned {
                    return Err(HostError::Rejected(format!("tab {id} is pinned")));
                }
            }
            let mut run = Vec::with_capacity(op.tab_ids.len());
            for id in &op.tab_ids {
                if let Some(pos) = tabs.iter().position(|t| t.id == *id) {
                    run.push(tabs.remove(pos));
                }
            }
            // 非固定标签页不能进入固定前缀
            let at = op.index.clamp(pinned_count(tabs), tabs.len());
            tabs.splice(at..at, run);
            renumber(tabs);
        }
        for tab_id in &op.tab_ids {
            let _ = self.events_tx.send(HostEvent::TabMoved {
                window_id: op.window_id,
                tab_id: *tab_id,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events_tx.subscribe()
    }
}

fn pinned_count(tabs: &[Tab]) -> usize {
    tabs.iter().take_while(|t| t.pinned).count()
}

fn renumber(tabs: &mut [Tab]) {
    for (i, t) in tabs.iter_mut().enumerate() {
        t.index = i;
    }
}
