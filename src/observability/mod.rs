//! 日志初始化：默认 info，可通过 RUST_LOG 覆盖（如 `RUST_LOG=tabsort=debug` 查看每次移动的审计日志）

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
