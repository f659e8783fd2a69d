//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TABSORT__*` 覆盖（双下划线表示嵌套，如 `TABSORT__RECONCILE__INTERVAL_SECS=10`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::order::DEFAULT_STORAGE_KEY;
use crate::tabs::index_tab::DEFAULT_INDEX_TAB_PATTERN;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub order: OrderSection,
    pub reconcile: ReconcileSection,
    pub index_tab: IndexTabSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [order] 段：排序表存放位置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderSection {
    pub storage_path: PathBuf,
    pub storage_key: String,
    /// 重新读盘以观察外部写入的间隔（秒），0 表示不观察
    pub refresh_secs: u64,
}

impl Default for OrderSection {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("data/sort-order.json"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            refresh_secs: 5,
        }
    }
}

impl OrderSection {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

/// [reconcile] 段：超时、慢整理阈值、周期触发
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    /// 单个移动操作超时（秒）
    pub move_timeout_secs: u64,
    pub slow_pass_warn_ms: u64,
    /// 0 表示不启用定时触发
    pub interval_secs: u64,
    pub enabled: bool,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            move_timeout_secs: 60,
            slow_pass_warn_ms: 500,
            interval_secs: 30,
            enabled: true,
        }
    }
}

impl ReconcileSection {
    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_secs)
    }

    pub fn slow_pass_warn(&self) -> Duration {
        Duration::from_millis(self.slow_pass_warn_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// [index_tab] 段：索引标签页 URL 模式（可带 `container` 命名分组）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexTabSection {
    pub url_pattern: String,
}

impl Default for IndexTabSection {
    fn default() -> Self {
        Self {
            url_pattern: DEFAULT_INDEX_TAB_PATTERN.to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TABSORT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TABSORT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TABSORT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.reconcile.move_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.reconcile.slow_pass_warn(), Duration::from_millis(500));
        assert_eq!(cfg.order.storage_key, "containerSortOrder");
        assert!(crate::tabs::IndexTabMatcher::new(&cfg.index_tab.url_pattern).is_ok());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[reconcile]\nmove_timeout_secs = 5\nenabled = false\n\n[order]\nstorage_key = \"k\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.reconcile.move_timeout_secs, 5);
        assert!(!cfg.reconcile.enabled);
        assert_eq!(cfg.reconcile.slow_pass_warn_ms, 500);
        assert_eq!(cfg.order.storage_key, "k");
    }
}
