//! 内存键值存储（测试用）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::core::StoreError;
use crate::storage::{KeyValueStore, StorageChange};

#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, serde_json::Value>>,
    changes_tx: broadcast::Sender<StorageChange>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(64);
        Self {
            data: RwLock::new(HashMap::new()),
            changes_tx,
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// 模拟另一个进程写入同一个键
    pub async fn inject_external(&self, key: &str, value: serde_json::Value) {
        self.data.write().await.insert(key.to_string(), value.clone());
        let _ = self.changes_tx.send(StorageChange {
            key: key.to_string(),
            new_value: Some(value),
        });
    }

    /// 之后所有 set 都返回 Backend 错误
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        self.data.write().await.insert(key.to_string(), value.clone());
        let _ = self.changes_tx.send(StorageChange {
            key: key.to_string(),
            new_value: Some(value),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes_tx.subscribe()
    }
}
