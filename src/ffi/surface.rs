//! ### English
//! C ABI bindings for surface lifecycle and producer operations.
//!
//! ### 中文
//! surface 生命周期与生产者操作的 C ABI 绑定。

use dpi::PhysicalSize;

use super::{XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT, XIAN_COMPOSITOR_OK, XianCompositor};
use crate::engine::display::OutputId;
use crate::engine::flags::SurfaceFlags;
use crate::engine::{SurfaceHandle, SurfaceParams};

#[unsafe(no_mangle)]
/// ### English
/// Creates one surface and returns its packed handle, or `0` on failure.
///
/// A `0` width or height uses the compositor's default surface size. `flags` is a bitmask of
/// `XIAN_SURFACE_FLAG_*`.
///
/// ### 中文
/// 创建一个 surface 并返回打包后的句柄，失败时返回 `0`。
///
/// 宽或高为 `0` 时使用合成器的默认 surface 尺寸。`flags` 为 `XIAN_SURFACE_FLAG_*` 位掩码。
pub unsafe extern "C" fn xian_compositor_create_surface(
    compositor: *mut XianCompositor,
    width: u32,
    height: u32,
    flags: u32,
) -> u64 {
    if compositor.is_null() {
        return 0;
    }

    let params = SurfaceParams::new(PhysicalSize::new(width, height))
        .with_flags(SurfaceFlags::from_bits(flags));
    match unsafe { (*compositor).runtime.create_surface(params) } {
        Ok(handle) => handle.to_raw(),
        Err(err) => {
            log::warn!("surface creation failed: {err}");
            0
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a surface. Any thread blocked in `xian_compositor_swap_buffers` on it returns
/// `XIAN_COMPOSITOR_ERR_CLOSED`.
///
/// ### 中文
/// 销毁 surface。在该 surface 上阻塞于 `xian_compositor_swap_buffers` 的线程会返回
/// `XIAN_COMPOSITOR_ERR_CLOSED`。
pub unsafe extern "C" fn xian_compositor_destroy_surface(
    compositor: *mut XianCompositor,
    surface: u64,
) -> i32 {
    if compositor.is_null() {
        return XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT;
    }

    match unsafe { (*compositor).runtime.destroy_surface(SurfaceHandle::from_raw(surface)) } {
        Ok(()) => XIAN_COMPOSITOR_OK,
        Err(err) => super::error_code(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Submits the surface's current buffer and blocks until the next one is available.
///
/// Returns `XIAN_COMPOSITOR_OK` or a negative `XIAN_COMPOSITOR_ERR_*` code.
///
/// ### 中文
/// 提交 surface 的当前缓冲区，并阻塞直到下一个缓冲区可用。
///
/// 返回 `XIAN_COMPOSITOR_OK` 或负数的 `XIAN_COMPOSITOR_ERR_*` 错误码。
pub unsafe extern "C" fn xian_compositor_swap_buffers(
    compositor: *mut XianCompositor,
    surface: u64,
) -> i32 {
    if compositor.is_null() {
        return XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT;
    }

    match unsafe { (*compositor).runtime.swap_buffers(SurfaceHandle::from_raw(surface)) } {
        Ok(_) => XIAN_COMPOSITOR_OK,
        Err(err) => super::error_code(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Id of the buffer the surface is currently drawing into, or `0` if there is none.
///
/// ### 中文
/// surface 当前正在绘制的缓冲区 id；没有时返回 `0`。
pub unsafe extern "C" fn xian_compositor_current_buffer_id(
    compositor: *mut XianCompositor,
    surface: u64,
) -> u32 {
    if compositor.is_null() {
        return 0;
    }

    unsafe { (*compositor).runtime.current_buffer_id(SurfaceHandle::from_raw(surface)) }
        .map(|id| id.as_u32())
        .unwrap_or(0)
}

#[unsafe(no_mangle)]
/// ### English
/// Shows `surface` on output `output_id` (outputs are numbered from 1).
///
/// ### 中文
/// 在编号为 `output_id` 的输出上显示 `surface`（输出从 1 开始编号）。
pub unsafe extern "C" fn xian_compositor_attach_surface(
    compositor: *mut XianCompositor,
    surface: u64,
    output_id: u32,
) -> i32 {
    if compositor.is_null() {
        return XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT;
    }

    let handle = SurfaceHandle::from_raw(surface);
    match unsafe { (*compositor).runtime.attach_surface(handle, OutputId(output_id)) } {
        Ok(()) => XIAN_COMPOSITOR_OK,
        Err(err) => super::error_code(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Reallocates the surface's buffers at the new size (all-or-nothing).
///
/// ### 中文
/// 以新尺寸重新分配 surface 的缓冲区（要么全部成功要么全部失败）。
pub unsafe extern "C" fn xian_compositor_resize_surface(
    compositor: *mut XianCompositor,
    surface: u64,
    width: u32,
    height: u32,
) -> i32 {
    if compositor.is_null() || width == 0 || height == 0 {
        return XIAN_COMPOSITOR_ERR_INVALID_ARGUMENT;
    }

    let handle = SurfaceHandle::from_raw(surface);
    match unsafe {
        (*compositor)
            .runtime
            .resize_surface(handle, PhysicalSize::new(width, height))
    } {
        Ok(()) => XIAN_COMPOSITOR_OK,
        Err(err) => super::error_code(&err),
    }
}
