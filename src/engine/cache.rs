//! ### English
//! Cache-line alignment helper for atomics shared between the producer, consumer and
//! diagnostics threads.
//!
//! ### 中文
//! 生产者、消费者与诊断线程之间共享原子变量时使用的 cache line 对齐工具。

use std::ops::Deref;

/// ### English
/// The cache line size we optimize for (bytes).
///
/// ### 中文
/// 作为优化目标的 cache line 大小（字节）。
pub(crate) const CACHE_LINE_BYTES: usize = 64;

/// ### English
/// Wraps a value so it starts on its own cache line and never shares one with a neighbour.
///
/// The frame counter is written once per consumer post but read by every producer for latency
/// accounting; keeping it apart from unrelated fields avoids false sharing on that hot read.
///
/// ### 中文
/// 包装一个值，使其独占一条 cache line，不与相邻字段共享。
///
/// 帧计数器每次消费者 post 写一次，但会被所有生产者读取用于延迟统计；
/// 将其与无关字段隔开可以避免这一热读路径上的伪共享。
#[repr(C, align(64))]
#[derive(Default)]
pub(crate) struct CachePadded<T> {
    value: T,
}

const _: () = assert!(std::mem::align_of::<CachePadded<u8>>() == CACHE_LINE_BYTES);

impl<T> CachePadded<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}
