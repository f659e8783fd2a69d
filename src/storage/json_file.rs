//! 单文件 JSON 键值存储
//!
//! 整个键值表存为一个 pretty JSON 对象；文件不存在时视为空表。写入先写临时文件再 rename，
//! 保证读者永远看不到半个文件。refresh() 重新读盘，对与上次观察不同的键广播变更。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{broadcast, Mutex};

use crate::core::StoreError;
use crate::storage::{KeyValueStore, StorageChange};

type Table = HashMap<String, serde_json::Value>;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// 上次读到 / 写入的整表；同时串行化写操作
    observed: Mutex<Table>,
    changes_tx: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    /// 打开存储并读入当前内容作为初始观察值
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let table = read_table(&path).await?;
        let (changes_tx, _) = broadcast::channel(64);
        Ok(Self {
            path,
            observed: Mutex::new(table),
            changes_tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 重新读盘，广播外部写入造成的变化，返回变化的键数
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let mut observed = self.observed.lock().await;
        let current = read_table(&self.path).await?;

        let mut changes = Vec::new();
        for (key, value) in &current {
            if observed.get(key) != Some(value) {
                changes.push(StorageChange {
                    key: key.clone(),
                    new_value: Some(value.clone()),
                });
            }
        }
        for key in observed.keys() {
            if !current.contains_key(key) {
                changes.push(StorageChange {
                    key: key.clone(),
                    new_value: None,
                });
            }
        }
        *observed = current;
        drop(observed);

        let n = changes.len();
        for change in changes {
            tracing::debug!(key = %change.key, "External storage change observed");
            let _ = self.changes_tx.send(change);
        }
        Ok(n)
    }

    async fn write_table(&self, table: &Table) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(table)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let table = read_table(&self.path).await?;
        Ok(table.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut observed = self.observed.lock().await;
        // 以磁盘为准，避免覆盖其他键上的外部写入
        let mut table = read_table(&self.path).await?;
        table.insert(key.to_string(), value.clone());
        self.write_table(&table).await?;
        *observed = table;
        drop(observed);

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

async fn read_table(path: &Path) -> Result<Table, StoreError> {
    match fs::read_to_string(path).await {
        Ok(data) if data.trim().is_empty() => Ok(Table::new()),
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("none.json")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        let mut rx = store.subscribe();

        store.set("k", json!(["a", "b"])).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().new_value, Some(json!(["a", "b"])));

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!(["a", "b"])));
    }

    #[tokio::test]
    async fn refresh_reports_external_writes_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store.set("k", json!(1)).await.unwrap();
        let mut rx = store.subscribe();

        std::fs::write(&path, r#"{"k": 2, "other": true}"#).unwrap();
        assert_eq!(store.refresh().await.unwrap(), 2);
        assert_eq!(store.refresh().await.unwrap(), 0);

        let mut keys = vec![rx.recv().await.unwrap().key, rx.recv().await.unwrap().key];
        keys.sort();
        assert_eq!(keys, vec!["k".to_string(), "other".to_string()]);
    }

    #[tokio::test]
    async fn set_keeps_other_keys_written_externally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        std::fs::write(&path, r#"{"foreign": 7}"#).unwrap();
        store.set("k", json!("v")).await.unwrap();
        assert_eq!(store.get("foreign").await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path).await, Err(StoreError::Serde(_))));
    }
}
