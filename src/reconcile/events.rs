//! 整理过程诊断事件（onPassStarted / onPassEnded），可序列化为 JSON

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::PassReport;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassEvent {
    Started {
        pass_id: String,
        at: DateTime<Utc>,
    },
    Ended {
        pass_id: String,
        at: DateTime<Utc>,
        duration_ms: u64,
        report: PassReport,
    },
}

impl PassEvent {
    pub fn pass_id(&self) -> &str {
        match self {
            PassEvent::Started { pass_id, .. } | PassEvent::Ended { pass_id, .. } => pass_id,
        }
    }
}
