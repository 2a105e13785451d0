//! ### English
//! Surfaces: the producer-facing API. Each surface owns exactly one `BufferQueue` and the buffer
//! its client is currently drawing into.
//!
//! ### 中文
//! Surface：面向生产者的 API。每个 surface 拥有且仅拥有一个 `BufferQueue`，以及客户端当前
//! 正在绘制的缓冲区。

use dpi::PhysicalSize;

use crate::engine::buffer::{BufferProperties, BufferUsage, PixelFormat};
use crate::engine::flags::SurfaceFlags;

mod id_map;
mod registry;

pub use registry::SurfaceRegistry;

/// ### English
/// Parameters for `SurfaceRegistry::create_surface`.
///
/// ### 中文
/// `SurfaceRegistry::create_surface` 的参数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceParams {
    pub size: PhysicalSize<u32>,
    pub format: PixelFormat,
    pub usage: BufferUsage,
    pub flags: SurfaceFlags,
}

impl SurfaceParams {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            format: PixelFormat::default(),
            usage: BufferUsage::default(),
            flags: SurfaceFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: SurfaceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn properties(&self) -> BufferProperties {
        BufferProperties::new(self.size, self.format, self.usage)
    }
}

/// ### English
/// Handle to a surface. `generation` identifies the registry that issued it, so handles
/// outliving their registry are detected as stale instead of aliasing a new surface.
///
/// ### 中文
/// surface 句柄。`generation` 标识签发它的注册表，因此比注册表活得更久的句柄会被识别为
/// 过期，而不会误指向新的 surface。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    pub id: u32,
    pub generation: u32,
}

impl SurfaceHandle {
    /// ### English
    /// Packs the handle into a `u64` for the C ABI (`generation` high, `id` low). Never `0` for a
    /// handle issued by a registry.
    ///
    /// ### 中文
    /// 将句柄打包为 `u64` 以便通过 C ABI 传递（高位为 `generation`，低位为 `id`）。
    /// 注册表签发的句柄打包后不会为 `0`。
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.id)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            id: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}
