//! 持久化键值存储
//!
//! 排序表只依赖 KeyValueStore：整值读写 + 变更广播。每次成功 set 都广播一次，
//! 外部进程写入同一文件时由 JsonFileStore::refresh 观察到并广播。

pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::StoreError;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// 某个键的新值（None 表示被删除）
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<serde_json::Value>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// 原子地整体替换某个键的值
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}
