//! ### English
//! Logger installation (`env_logger` behind the `log` facade).
//!
//! ### 中文
//! 日志安装（`log` facade 后端使用 `env_logger`）。

/// ### English
/// Installs `env_logger` as the global logger, honouring `RUST_LOG` (default level `warn`).
///
/// Safe to call more than once; later calls are no-ops. Returns `true` iff this call installed
/// the logger.
///
/// ### 中文
/// 将 `env_logger` 安装为全局 logger，遵循 `RUST_LOG`（默认级别 `warn`）。
///
/// 可以重复调用；之后的调用不做任何事。仅当本次调用完成安装时返回 `true`。
pub fn init() -> bool {
    let installed = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    )
    .format_timestamp_micros()
    .try_init()
    .is_ok();

    if installed {
        log::debug!("logger installed");
    }
    installed
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        let _ = super::init();
        assert!(!super::init());
    }
}
