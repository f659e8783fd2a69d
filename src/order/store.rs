//! Sorting Order Store：持久化的容器顺序
//!
//! 读：get_order 每次访问底层存储（I/O 错误向上传播）；compare / index 使用内存缓存的排名索引。
//! 写：set_order 整体替换序列，成功后恰好通知一次。写入串行进行，缓存先于底层存储更新
//! （失败时回滚），因此存储回声到达监听任务时已与缓存一致，不会再次通知。
//! 外部写入经 spawn_change_listener 观察，与缓存不同才通知。

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::core::OrderError;
use crate::order::{ContainerId, OrderIndex, SortOrder};
use crate::storage::KeyValueStore;

pub const DEFAULT_STORAGE_KEY: &str = "containerSortOrder";

struct Cached {
    order: SortOrder,
    index: Arc<OrderIndex>,
}

impl Cached {
    fn new(order: SortOrder) -> Self {
        let index = Arc::new(OrderIndex::new(&order));
        Self { order, index }
    }
}

pub struct SortingOrderStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    cache: RwLock<Cached>,
    write_lock: Mutex<()>,
    changed_tx: broadcast::Sender<SortOrder>,
}

impl SortingOrderStore {
    /// 从存储读取初始顺序；键不存在时为空序列
    pub async fn load(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self, OrderError> {
        let key = key.into();
        let order = match kv.get(&key).await? {
            Some(value) => parse_order(&value)?,
            None => SortOrder::default(),
        };
        let (changed_tx, _) = broadcast::channel(32);
        tracing::debug!(key = %key, containers = order.len(), "Sort order loaded");
        Ok(Self {
            kv,
            key,
            cache: RwLock::new(Cached::new(order)),
            write_lock: Mutex::new(()),
            changed_tx,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 读取持久化的顺序（并同步缓存）
    pub async fn get_order(&self) -> Result<SortOrder, OrderError> {
        let order = match self.kv.get(&self.key).await? {
            Some(value) => parse_order(&value)?,
            None => SortOrder::default(),
        };
        self.apply_observed(order.clone());
        Ok(order)
    }

    /// 整体替换顺序；重复项已由 SortOrder 去除
    pub async fn set_order(&self, order: SortOrder) -> Result<(), OrderError> {
        let value = serde_json::to_value(&order).map_err(crate::core::StoreError::from)?;
        let _write = self.write_lock.lock().await;
        let previous = self.replace_cache(order.clone());
        if let Err(e) = self.kv.set(&self.key, value).await {
            self.rollback_cache(&order, previous);
            return Err(e.into());
        }
        tracing::info!(containers = order.len(), "Sort order updated");
        let _ = self.changed_tx.send(order);
        Ok(())
    }

    /// 拖拽单个容器到新位置
    pub async fn move_container(&self, id: &ContainerId, position: usize) -> Result<(), OrderError> {
        let next = self.current().with_moved(id, position);
        self.set_order(next).await
    }

    /// 容器被删除时移出顺序表；不在表中则不写入
    pub async fn remove_container(&self, id: &ContainerId) -> Result<(), OrderError> {
        let current = self.current();
        if current.position(id).is_none() {
            return Ok(());
        }
        self.set_order(current.without(id)).await
    }

    /// 缓存中的顺序
    pub fn current(&self) -> SortOrder {
        self.read_cache().order.clone()
    }

    /// 缓存中的排名索引快照；一轮整理内保持不变
    pub fn index(&self) -> Arc<OrderIndex> {
        Arc::clone(&self.read_cache().index)
    }

    pub fn compare(&self, a: &ContainerId, b: &ContainerId) -> Ordering {
        self.read_cache().index.compare(a, b)
    }

    /// onOrderChanged
    pub fn subscribe(&self) -> broadcast::Receiver<SortOrder> {
        self.changed_tx.subscribe()
    }

    /// 监听底层存储的变化（外部写入），直到存储关闭
    pub fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut rx = self.kv.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) if change.key == store.key => {
                        let parsed = match change.new_value {
                            Some(value) => parse_order(&value),
                            None => Ok(SortOrder::default()),
                        };
                        match parsed {
                            Ok(order) => {
                                store.apply_observed(order);
                            }
                            Err(e) => tracing::warn!(error = %e, "Ignoring malformed sort order change"),
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Storage change listener lagged, re-reading order");
                        if let Err(e) = store.get_order().await {
                            tracing::warn!(error = %e, "Failed to re-read sort order");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// 缓存与观察值不同则替换并通知，返回是否变化
    fn apply_observed(&self, order: SortOrder) -> bool {
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            if cache.order == order {
                return false;
            }
            *cache = Cached::new(order.clone());
        }
        tracing::info!(containers = order.len(), "Sort order changed externally");
        let _ = self.changed_tx.send(order);
        true
    }

    fn replace_cache(&self, order: SortOrder) -> Cached {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *cache, Cached::new(order))
    }

    /// 写入失败：缓存仍是本次写入的值时恢复旧值（期间观察到的外部变化保留）
    fn rollback_cache(&self, written: &SortOrder, previous: Cached) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.order == *written {
            *cache = previous;
        }
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Cached> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// 持久化格式：容器 ID 数组，元素可以是字符串或数字
fn parse_order(value: &serde_json::Value) -> Result<SortOrder, OrderError> {
    let items = value
        .as_array()
        .ok_or_else(|| OrderError::Malformed(format!("expected array, got {value}")))?;
    let ids = items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(ContainerId::new(s.clone())),
            serde_json::Value::Number(n) => Ok(ContainerId::new(n.to_string())),
            other => Err(OrderError::Malformed(format!("invalid container id {other}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SortOrder::new(ids))
}
