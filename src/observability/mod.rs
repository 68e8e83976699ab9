//! 可观测性
//!
//! 结构化日志初始化：默认人类可读的 fmt 层，production 可切换为 JSON lines
//! （每行含 timestamp / level / target / message 及 agent、thread_id 等字段）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志；json=true 时输出 JSON lines，默认 info，可用 RUST_LOG 覆盖
pub fn init(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive("info".parse().unwrap());
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
