//! ### English
//! C ABI bindings for compositor lifecycle (create/destroy/tick).
//!
//! ### 中文
//! 合成器生命周期相关的 C ABI 绑定（create/destroy/tick）。

use std::ffi::c_char;
use std::sync::Arc;

use dpi::PhysicalSize;

use super::{XianCompositor, XianCompositorTick};
use crate::engine::display::LoggingDisplayReport;
use crate::engine::{CompositorConfig, CompositorRuntime, Platform};

fn create(config: CompositorConfig) -> *mut XianCompositor {
    match CompositorRuntime::new(config, Platform::headless(), Arc::new(LoggingDisplayReport)) {
        Ok(runtime) => Box::into_raw(Box::new(XianCompositor { runtime })),
        Err(err) => {
            log::error!("failed to create compositor: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Creates a compositor with one default output on the headless platform.
///
/// `target_fps = 0` means ticks are driven by the host (`xian_compositor_tick`); otherwise an
/// internal timer thread composites at that rate. `XIAN_COMPOSITOR_TARGET_FPS` overrides it.
///
/// ### 中文
/// 在无头平台上创建带一个默认输出的合成器。
///
/// `target_fps = 0` 表示由宿主驱动 tick（`xian_compositor_tick`）；否则由内部计时线程按该频率
/// 合成。`XIAN_COMPOSITOR_TARGET_FPS` 可覆盖该值。
pub extern "C" fn xian_compositor_create(
    default_width: u32,
    default_height: u32,
    target_fps: u32,
) -> *mut XianCompositor {
    let mut config = CompositorConfig {
        target_fps,
        default_surface_size: PhysicalSize::new(default_width.max(1), default_height.max(1)),
        ..CompositorConfig::default()
    };
    config.apply_env_overrides();
    create(config)
}

#[unsafe(no_mangle)]
/// ### English
/// Creates a compositor from a JSON configuration file.
///
/// `config_path` is an optional NUL-terminated UTF-8 string; NULL or an empty string means the
/// default configuration. Returns NULL if the file cannot be read or is invalid.
///
/// ### 中文
/// 根据 JSON 配置文件创建合成器。
///
/// `config_path` 为可选的 NUL 结尾 UTF-8 字符串；NULL 或空字符串表示使用默认配置。
/// 文件无法读取或无效时返回 NULL。
pub unsafe extern "C" fn xian_compositor_create_from_config(
    config_path: *const c_char,
) -> *mut XianCompositor {
    let mut config = match unsafe { super::cstr_to_path(config_path) } {
        Some(path) => match CompositorConfig::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("failed to load {}: {err}", path.display());
                return std::ptr::null_mut();
            }
        },
        None => CompositorConfig::default(),
    };
    config.apply_env_overrides();
    create(config)
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a compositor created by `xian_compositor_create*`.
///
/// This stops the refresh driver and closes every remaining surface. Do not use any surface
/// handle after destroying the compositor.
///
/// ### 中文
/// 销毁由 `xian_compositor_create*` 创建的合成器。
///
/// 该操作会停止 refresh driver 并关闭所有剩余 surface；销毁之后不要再使用任何 surface 句柄。
pub unsafe extern "C" fn xian_compositor_destroy(compositor: *mut XianCompositor) {
    if compositor.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(compositor));
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Host vsync tick: composites once (external-vsync mode only).
///
/// Returns `true` and fills `out` (if non-NULL) when a composite ran; `false` when paused, in
/// fixed-interval mode, or for a NULL compositor.
///
/// ### 中文
/// 宿主 vsync tick：合成一次（仅外部 vsync 模式）。
///
/// 执行了合成时返回 `true` 并填充 `out`（若非 NULL）；暂停、固定间隔模式或合成器为 NULL
/// 时返回 `false`。
pub unsafe extern "C" fn xian_compositor_tick(
    compositor: *mut XianCompositor,
    out: *mut XianCompositorTick,
) -> bool {
    if compositor.is_null() {
        return false;
    }

    let Some(outcome) = (unsafe { (*compositor).runtime.tick() }) else {
        return false;
    };
    if !out.is_null() {
        unsafe { out.write(XianCompositorTick::from(&outcome)) };
    }
    true
}
