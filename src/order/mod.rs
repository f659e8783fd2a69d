//! 容器顺序：ID、排序表、排名索引与持久化的 Sorting Order Store

pub mod container;
pub mod store;

pub use container::{ContainerId, OrderIndex, SortOrder};
pub use store::{SortingOrderStore, DEFAULT_STORAGE_KEY};
