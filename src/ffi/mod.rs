//! ### English
//! C ABI surface for `xian_compositor`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`.
//! Strings passed from the host must be NUL-terminated UTF-8 (C string); they will be validated as
//! UTF-8 and will be truncated at the first NUL byte.
//! Surfaces are passed as packed `u64` handles; `0` is never a valid handle.
//!
//! ### 中文
//! `xian_compositor` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。
//! 宿主传入的字符串必须是以 NUL 结尾的 UTF-8（C 字符串）；Rust 会校验 UTF-8，
//! 且在遇到第一个 NUL 字节处截断。
//! surface 以打包后的 `u64` 句柄传递；`0` 永远不是有效句柄。
mod abi;
mod compositor;
mod surface;

use std::ffi::{CStr, c_char};
use std::path::PathBuf;

use crate::engine::error::{DisplayError, QueueError, RuntimeError, SurfaceError};
use crate::engine::{CompositeOutcome, CompositorRuntime};

#[repr(C)]
/// ### English
/// Opaque compositor handle owning the runtime (display, surfaces, refresh driver).
///
/// ### 中文
/// 不透明合成器句柄，持有运行时（显示端、surface、refresh driver）。
pub struct XianCompositor {
    runtime: CompositorRuntime,
}

#[repr(C)]
/// ### English
/// Summary of one composite tick returned to the host.
///
/// ### 中文
/// 返回给宿主的单次合成 tick 摘要。
pub struct XianCompositorTick {
    /// ### English
    /// Frame clock value after the tick.
    ///
    /// ### 中文
    /// tick 之后的帧时钟值。
    pub frame: u64,
    pub posted: u32,
    pub reposted: u32,
    pub skipped: u32,
    pub failed: u32,
    /// ### English
    /// Largest submit-to-display latency among freshly posted frames (in frames).
    ///
    /// ### 中文
    /// 新 post 帧中最大的提交到显示延迟（单位：帧）。
    pub max_latency: u64,
}

/// ### English
/// C ABI version for `xian_compositor`.
///
/// ### 中文
/// `xian_compositor` 的 C ABI 版本号。
const XIAN_COMPOSITOR_ABI_VERSION: u32 = 1;

pub const XIAN_COMPOSITOR_OK: i32 = 0;
pub const XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT: i32 = -1;
pub const XIAN_COMPOSITOR_ERR_UNKNOWN_SURFACE: i32 = -2;
pub const XIAN_COMPOSITOR_ERR_STALE_HANDLE: i32 = -3;
pub const XIAN_COMPOSITOR_ERR_CLOSED: i32 = -4;
pub const XIAN_COMPOSITOR_ERR_ALLOCATION: i32 = -5;
pub const XIAN_COMPOSITOR_ERR_CONTRACT_VIOLATION: i32 = -6;
pub const XIAN_COMPOSITOR_ERR_UNKNOWN_OUTPUT: i32 = -7;
pub const XIAN_COMPOSITOR_ERR_SHUT_DOWN: i32 = -8;
pub const XIAN_COMPOSITOR_ERR_OTHER: i32 = -9;

impl From<&CompositeOutcome> for XianCompositorTick {
    fn from(value: &CompositeOutcome) -> Self {
        Self {
            frame: value.frame,
            posted: value.posted.len() as u32,
            reposted: value.reposted.len() as u32,
            skipped: value.skipped.len() as u32,
            failed: value.failed.len() as u32,
            max_latency: value
                .posted
                .iter()
                .map(|posted| posted.latency)
                .max()
                .unwrap_or(0),
        }
    }
}

/// ### English
/// Maps a runtime error to the negative status code returned through the C ABI.
///
/// ### 中文
/// 将运行时错误映射为通过 C ABI 返回的负数状态码。
fn error_code(err: &RuntimeError) -> i32 {
    match err {
        RuntimeError::ShutDown => XIAN_COMPOSITOR_ERR_SHUT_DOWN,
        RuntimeError::Config(_) => XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT,
        RuntimeError::Display(DisplayError::UnknownOutput(_)) => XIAN_COMPOSITOR_ERR_UNKNOWN_OUTPUT,
        RuntimeError::Display(_) => XIAN_COMPOSITOR_ERR_OTHER,
        RuntimeError::Surface(err) => match err {
            SurfaceError::UnknownSurface(_) => XIAN_COMPOSITOR_ERR_UNKNOWN_SURFACE,
            SurfaceError::StaleHandle => XIAN_COMPOSITOR_ERR_STALE_HANDLE,
            SurfaceError::NoCurrentBuffer(_) | SurfaceError::Queue(QueueError::Closed) => {
                XIAN_COMPOSITOR_ERR_CLOSED
            }
            SurfaceError::Queue(QueueError::Allocation(_)) => XIAN_COMPOSITOR_ERR_ALLOCATION,
            SurfaceError::Queue(QueueError::ContractViolation(_)) => {
                XIAN_COMPOSITOR_ERR_CONTRACT_VIOLATION
            }
            SurfaceError::Queue(QueueError::InvalidConfig(_)) => {
                XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT
            }
        },
    }
}

/// ### English
/// Converts an optional NUL-terminated UTF-8 C string into a `PathBuf`.
///
/// Returns `None` for NULL pointers, invalid UTF-8, or empty strings.
///
/// # Safety
/// `ptr` must be valid and point to a NUL-terminated string for the duration of the call.
///
/// ### 中文
/// 将可选的 NUL 结尾 UTF-8 C 字符串转换为 `PathBuf`。
///
/// 对 NULL 指针、UTF-8 非法或空字符串返回 `None`。
///
/// # Safety
/// `ptr` 在本次调用期间必须有效，并指向以 NUL 结尾的字符串。
unsafe fn cstr_to_path(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }

    let value = unsafe { CStr::from_ptr(ptr) }.to_str().ok()?;
    if value.is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::abi::*;
    use super::compositor::*;
    use super::surface::*;
    use super::*;

    #[test]
    fn surface_lifecycle_through_the_c_abi() {
        assert_eq!(xian_compositor_abi_version(), XIAN_COMPOSITOR_ABI_VERSION);

        let compositor = xian_compositor_create(640, 480, 0);
        assert!(!compositor.is_null());

        unsafe {
            let surface = xian_compositor_create_surface(compositor, 0, 0, 0);
            assert_ne!(surface, 0);
            assert_eq!(
                xian_compositor_attach_surface(compositor, surface, 1),
                XIAN_COMPOSITOR_OK
            );
            assert_eq!(
                xian_compositor_attach_surface(compositor, surface, 7),
                XIAN_COMPOSITOR_ERR_UNKNOWN_OUTPUT
            );

            let drawn = xian_compositor_current_buffer_id(compositor, surface);
            assert_ne!(drawn, 0);
            assert_eq!(xian_compositor_swap_buffers(compositor, surface), XIAN_COMPOSITOR_OK);

            let mut tick = std::mem::zeroed::<XianCompositorTick>();
            assert!(xian_compositor_tick(compositor, &mut tick));
            assert_eq!(tick.frame, 1);
            assert_eq!(tick.posted, 1);
            assert_eq!(tick.max_latency, 1);

            assert_eq!(
                xian_compositor_destroy_surface(compositor, surface),
                XIAN_COMPOSITOR_OK
            );
            assert_eq!(
                xian_compositor_swap_buffers(compositor, surface),
                XIAN_COMPOSITOR_ERR_UNKNOWN_SURFACE
            );
            assert_eq!(xian_compositor_current_buffer_id(compositor, surface), 0);

            xian_compositor_destroy(compositor);
        }
    }

    #[test]
    fn null_pointers_are_rejected() {
        unsafe {
            assert_eq!(xian_compositor_create_surface(std::ptr::null_mut(), 1, 1, 0), 0);
            assert_eq!(
                xian_compositor_swap_buffers(std::ptr::null_mut(), 1),
                XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT
            );
            assert!(!xian_compositor_tick(std::ptr::null_mut(), std::ptr::null_mut()));
            xian_compositor_destroy(std::ptr::null_mut());
        }
    }

    #[test]
    fn missing_config_file_fails_creation() {
        let path = CString::new("/nonexistent/xian-compositor.json").unwrap();
        let compositor = unsafe { xian_compositor_create_from_config(path.as_ptr()) };
        assert!(compositor.is_null());
    }
}
