//! 核心层：错误类型、驱动状态、优雅关闭

pub mod error;
pub mod shutdown;
pub mod state;

pub use error::{HostError, OrderError, PlanError, StoreError};
pub use shutdown::{ShutdownCoordinator, ShutdownManager, ShutdownReason};
pub use state::{DriverPhase, PassReport, WindowOutcome};
