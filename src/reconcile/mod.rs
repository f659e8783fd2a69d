//! 标签页顺序整理引擎
//!
//! - **comparator**: 容器顺序 + 索引标签页优先的标签页比较器
//! - **planner**: 单窗口的排列差分与移动规划
//! - **driver**: 单次飞行的整理驱动，窗口间并发、移动超时
//! - **events**: 整理开始 / 结束诊断事件
//! - **triggers**: 宿主事件、定时器、排序表变化触发整理

pub mod comparator;
pub mod driver;
pub mod events;
pub mod planner;
pub mod triggers;

pub use comparator::TabComparator;
pub use driver::Reconciler;
pub use events::PassEvent;
pub use planner::{apply_move, diff_moves, plan_window, WindowPlan};
pub use triggers::{Trigger, TriggerSurface};
