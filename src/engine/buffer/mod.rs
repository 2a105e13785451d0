//! ### English
//! Buffers: identity, size/format metadata, backing storage and the ready fence.
//!
//! A `Buffer` is a cheap clonable handle. The queue (not the handle) decides who may touch it at
//! any moment; producers and consumers only borrow it between acquire and submit/release.
//!
//! ### 中文
//! 缓冲区：身份、尺寸/格式元数据、底层存储与就绪 fence。
//!
//! `Buffer` 是可廉价克隆的句柄。由队列（而不是句柄本身）决定任一时刻谁可以使用它；
//! 生产者与消费者只在 acquire 与 submit/release 之间借用它。
mod fence;
mod handle;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use dpi::PhysicalSize;
use serde::{Deserialize, Serialize};

pub use fence::Fence;
pub use handle::{Buffer, NativeStorage};

/// ### English
/// Unique buffer identity. Never reused within a process (ids start at 1; 0 means "none" at the
/// C ABI).
///
/// ### 中文
/// 唯一的缓冲区标识。进程内永不复用（从 1 开始；在 C ABI 中 0 表示“无”）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(pub u32);

impl BufferId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// ### English
/// Monotonic id source owned by an allocator.
///
/// ### 中文
/// 分配器持有的单调 id 来源。
#[derive(Debug)]
pub struct BufferIdAllocator {
    next: AtomicU32,
}

impl Default for BufferIdAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }
}

impl BufferIdAllocator {
    pub fn next_id(&self) -> BufferId {
        BufferId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// ### English
/// Pixel layouts understood by the core. Channel order is listed most-significant first.
///
/// ### 中文
/// 核心可识别的像素布局。通道顺序按从高位到低位列出。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Argb8888,
    Xrgb8888,
    Abgr8888,
    Xbgr8888,
    Rgb565,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Argb8888 | Self::Xrgb8888 | Self::Abgr8888 | Self::Xbgr8888 => 4,
            Self::Rgb565 => 2,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Argb8888 | Self::Abgr8888)
    }
}

/// ### English
/// What the buffer will be used for; lets the allocator pick memory placement.
///
/// ### 中文
/// 缓冲区的用途；供分配器选择内存位置。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    /// ### English
    /// Rendered to by the GPU.
    ///
    /// ### 中文
    /// 由 GPU 渲染写入。
    #[default]
    Rendering,
    /// ### English
    /// Written by the CPU.
    ///
    /// ### 中文
    /// 由 CPU 写入。
    Software,
    /// ### English
    /// Directly scanned out (framebuffer).
    ///
    /// ### 中文
    /// 直接扫描输出（framebuffer）。
    Scanout,
}

/// ### English
/// Allocation request: size, format and usage.
///
/// ### 中文
/// 分配请求：尺寸、格式与用途。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferProperties {
    pub size: PhysicalSize<u32>,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl BufferProperties {
    pub fn new(size: PhysicalSize<u32>, format: PixelFormat, usage: BufferUsage) -> Self {
        Self {
            size,
            format,
            usage,
        }
    }

    /// ### English
    /// Bytes per row, without padding.
    ///
    /// ### 中文
    /// 每行字节数（不含填充）。
    pub fn stride(&self) -> u32 {
        self.size.width * self.format.bytes_per_pixel()
    }

    pub fn byte_len(&self) -> usize {
        self.stride() as usize * self.size.height as usize
    }
}

#[cfg(test)]
mod tests {
    use dpi::PhysicalSize;

    use super::*;

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let ids = BufferIdAllocator::default();
        assert_eq!(ids.next_id(), BufferId(1));
        assert_eq!(ids.next_id(), BufferId(2));
        assert_eq!(BufferId(7).to_string(), "#7");
    }

    #[test]
    fn stride_and_length_follow_format() {
        let argb = BufferProperties::new(
            PhysicalSize::new(10, 4),
            PixelFormat::Argb8888,
            BufferUsage::Rendering,
        );
        assert_eq!(argb.stride(), 40);
        assert_eq!(argb.byte_len(), 160);

        let rgb565 = BufferProperties {
            format: PixelFormat::Rgb565,
            ..argb
        };
        assert_eq!(rgb565.stride(), 20);
        assert!(!PixelFormat::Xrgb8888.has_alpha());
    }
}
