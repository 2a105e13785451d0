use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::cache::CachePadded;

/// ### English
/// Monotonic, lock-free frame counter.
///
/// The consumer calls `increment_and_load` exactly once per successful post; any thread may call
/// `load` at any time. Both use `SeqCst`, so an increment happens-before every read that observes
/// the new value.
///
/// A 64-bit counter incremented at display refresh rates does not overflow within any realistic
/// process lifetime; overflow is assumed never to happen.
///
/// ### 中文
/// 单调递增的无锁帧计数器。
///
/// 消费者每次成功 post 时调用且仅调用一次 `increment_and_load`；任意线程可随时调用 `load`。
/// 两者都使用 `SeqCst`，因此自增 happens-before 所有观察到新值的读取。
///
/// 以显示刷新率递增的 64 位计数器在任何现实的进程生命周期内都不会溢出；此处假定溢出永不发生。
#[derive(Default)]
pub struct FrameClock {
    frame: CachePadded<AtomicU64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            frame: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// ### English
    /// Atomically increments the counter and returns the new value.
    ///
    /// ### 中文
    /// 原子地递增计数器并返回新值。
    #[inline]
    pub fn increment_and_load(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[inline]
    pub fn load(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock").field("frame", &self.load()).finish()
    }
}
