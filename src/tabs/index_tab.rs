//! 索引标签页识别
//!
//! 索引标签页是容器分组的「标题页」，由 URL 模式识别。若模式带 `container` 命名分组，
//! 则捕获值必须等于该标签页自身的容器 ID，否则视为普通标签页。

use regex::Regex;

use crate::tabs::Tab;

pub const DEFAULT_INDEX_TAB_PATTERN: &str =
    r"^moz-extension://[^/]+/index-tab/index\.html\?(?:[^#]*&)?container=(?P<container>[^&#]+)";

#[derive(Debug, Clone)]
pub struct IndexTabMatcher {
    pattern: Regex,
    has_container_group: bool,
}

impl IndexTabMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(pattern)?;
        let has_container_group = pattern.capture_names().flatten().any(|n| n == "container");
        Ok(Self {
            pattern,
            has_container_group,
        })
    }

    pub fn is_index_tab(&self, tab: &Tab) -> bool {
        let Some(caps) = self.pattern.captures(&tab.url) else {
            return false;
        };
        if !self.has_container_group {
            return true;
        }
        caps.name("container")
            .map(|m| m.as_str() == tab.container.as_str())
            .unwrap_or(false)
    }
}

impl Default for IndexTabMatcher {
    fn default() -> Self {
        // 内置模式为常量，编译失败只可能是代码错误
        Self::new(DEFAULT_INDEX_TAB_PATTERN).expect("built-in index tab pattern is valid")
    }
}
