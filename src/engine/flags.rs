//! ### English
//! Bitflags controlling optional surface behaviors.
//!
//! These are passed through the C ABI as a `u32` bitmask and decoded by `SurfaceFlags`.
//!
//! ### 中文
//! 控制 surface 可选行为的位标志（bitflags）。
//!
//! 通过 C ABI 以 `u32` 位掩码传入，并由 `SurfaceFlags` 解码。

/// ### English
/// Unsafe mode: skip producer-side ready fences (lower overhead).
///
/// Submitted buffers are treated as complete immediately; the producer must make sure its writes
/// are finished before calling `swap_buffers` (e.g., by using other synchronization).
///
/// ### 中文
/// 不安全模式：跳过生产者侧的 ready fence（开销更低）。
///
/// 提交的缓冲区会被立即视为写入完成；生产者必须在调用 `swap_buffers` 前自行保证写入已结束
///（例如使用其它同步机制）。
pub const XIAN_SURFACE_FLAG_UNSAFE_NO_PRODUCER_FENCE: u32 = 1 << 0;

/// ### English
/// Enables dynamic queue scaling for this surface (pool grows toward `max_buffers` when the
/// producer keeps stalling, shrinks toward `min_buffers` when buffers sit unused).
///
/// ### 中文
/// 为该 surface 启用动态队列伸缩（生产者持续阻塞时向 `max_buffers` 扩张，缓冲区闲置时
/// 向 `min_buffers` 收缩）。
pub const XIAN_SURFACE_FLAG_DYNAMIC_SCALING: u32 = 1 << 1;

/// ### English
/// Forces double buffering (`max_buffers = min_buffers = 2`), trading throughput for the lowest
/// possible latency.
///
/// ### 中文
/// 强制双缓冲（`max_buffers = min_buffers = 2`），以吞吐换取最低延迟。
pub const XIAN_SURFACE_FLAG_DOUBLE_BUFFERED: u32 = 1 << 2;

const KNOWN_FLAGS: u32 = XIAN_SURFACE_FLAG_UNSAFE_NO_PRODUCER_FENCE
    | XIAN_SURFACE_FLAG_DYNAMIC_SCALING
    | XIAN_SURFACE_FLAG_DOUBLE_BUFFERED;

/// ### English
/// Decoded surface flags.
///
/// ### 中文
/// 解码后的 surface 标志。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceFlags {
    pub unsafe_no_producer_fence: bool,
    pub dynamic_scaling: bool,
    pub double_buffered: bool,
}

impl SurfaceFlags {
    /// ### English
    /// Decodes a raw bitmask. Unknown bits are ignored (logged at debug level).
    ///
    /// ### 中文
    /// 解码原始位掩码。未知位会被忽略（以 debug 级别记录日志）。
    pub fn from_bits(bits: u32) -> Self {
        if bits & !KNOWN_FLAGS != 0 {
            log::debug!("ignoring unknown surface flag bits {:#x}", bits & !KNOWN_FLAGS);
        }

        Self {
            unsafe_no_producer_fence: bits & XIAN_SURFACE_FLAG_UNSAFE_NO_PRODUCER_FENCE != 0,
            dynamic_scaling: bits & XIAN_SURFACE_FLAG_DYNAMIC_SCALING != 0,
            double_buffered: bits & XIAN_SURFACE_FLAG_DOUBLE_BUFFERED != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.unsafe_no_producer_fence {
            bits |= XIAN_SURFACE_FLAG_UNSAFE_NO_PRODUCER_FENCE;
        }
        if self.dynamic_scaling {
            bits |= XIAN_SURFACE_FLAG_DYNAMIC_SCALING;
        }
        if self.double_buffered {
            bits |= XIAN_SURFACE_FLAG_DOUBLE_BUFFERED;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_bits_and_ignores_the_rest() {
        let flags = SurfaceFlags::from_bits(
            XIAN_SURFACE_FLAG_DYNAMIC_SCALING | XIAN_SURFACE_FLAG_DOUBLE_BUFFERED | (1 << 31),
        );
        assert!(flags.dynamic_scaling);
        assert!(flags.double_buffered);
        assert!(!flags.unsafe_no_producer_fence);
        assert_eq!(
            flags.bits(),
            XIAN_SURFACE_FLAG_DYNAMIC_SCALING | XIAN_SURFACE_FLAG_DOUBLE_BUFFERED
        );
    }
}
