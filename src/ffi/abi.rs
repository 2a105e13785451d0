#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn xian_compositor_abi_version() -> u32 {
    super::XIAN_COMPOSITOR_ABI_VERSION
}

#[unsafe(no_mangle)]
/// ### English
/// Installs the `env_logger` backend (honours `RUST_LOG`). Returns `true` if this call installed
/// it, `false` if a logger was already installed.
///
/// ### 中文
/// 安装 `env_logger` 后端（遵循 `RUST_LOG`）。若本次调用完成了安装返回 `true`，
/// 若已安装过 logger 则返回 `false`。
pub extern "C" fn xian_compositor_init_logging() -> bool {
    crate::engine::logging::init()
}
