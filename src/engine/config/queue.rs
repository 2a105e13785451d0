use serde::{Deserialize, Serialize};

use crate::engine::error::ConfigError;

/// ### English
/// Buffer queue sizing and scaling policy.
///
/// With dynamic scaling disabled the pool is allocated at `max_buffers` up front and never
/// changes. With it enabled the queue starts at `min_buffers` and moves within
/// `[min_buffers, max_buffers]` based on observed contention.
///
/// ### 中文
/// 缓冲队列的容量与伸缩策略。
///
/// 关闭动态伸缩时，缓冲池在创建时一次性分配 `max_buffers` 个且不再变化；
/// 开启后队列从 `min_buffers` 开始，并根据观察到的竞争在 `[min_buffers, max_buffers]` 内调整。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub min_buffers: usize,
    pub max_buffers: usize,
    /// ### English
    /// How many buffers must be free before the producer may take one.
    ///
    /// `2` keeps the most recently displayed buffer out of the producer's hands, which sets the
    /// effective latency to `pool_size - 1`.
    ///
    /// ### 中文
    /// 生产者获取缓冲区前至少需要的空闲缓冲数量。
    ///
    /// 取 `2` 时最近一次显示的缓冲区不会被交给生产者，有效延迟为 `pool_size - 1`。
    pub min_free_for_acquire: usize,
    pub dynamic_scaling: bool,
    /// ### English
    /// Consecutive blocked producer acquires before the effective capacity grows by one.
    ///
    /// ### 中文
    /// 有效容量加一之前需要连续发生的生产者阻塞 acquire 次数。
    pub grow_after_stalls: u32,
    /// ### English
    /// Consecutive unblocked acquires with surplus free buffers before capacity shrinks by one.
    ///
    /// ### 中文
    /// 有效容量减一之前需要连续出现的“未阻塞且有多余空闲缓冲”的 acquire 次数。
    pub shrink_after_idle_frames: u32,
    /// ### English
    /// How long the consumer waits for a producer fence before posting anyway.
    ///
    /// ### 中文
    /// 消费者在 post 前等待生产者 fence 的最长时间（超时后仍然 post）。
    pub producer_fence_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_buffers: 2,
            max_buffers: 3,
            min_free_for_acquire: 2,
            dynamic_scaling: false,
            grow_after_stalls: 3,
            shrink_after_idle_frames: 120,
            producer_fence_timeout_ms: 100,
        }
    }
}

impl QueueConfig {
    /// ### English
    /// Fixed-size pool of `buffers` buffers (no scaling).
    ///
    /// #### Parameters
    /// - `buffers`: Pool size (2 = double buffering, 3 = triple buffering).
    ///
    /// ### 中文
    /// 固定大小为 `buffers` 的缓冲池（不伸缩）。
    ///
    /// #### 参数
    /// - `buffers`：缓冲池大小（2 = 双缓冲，3 = 三缓冲）。
    pub fn fixed(buffers: usize) -> Self {
        Self {
            min_buffers: buffers,
            max_buffers: buffers,
            ..Self::default()
        }
    }

    /// ### English
    /// Number of buffers allocated when the queue is constructed.
    ///
    /// ### 中文
    /// 队列创建时分配的缓冲区数量。
    pub fn initial_buffers(&self) -> usize {
        if self.dynamic_scaling {
            self.min_buffers
        } else {
            self.max_buffers
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_buffers < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_buffers must be at least 2 (got {})",
                self.min_buffers
            )));
        }
        if self.max_buffers < self.min_buffers {
            return Err(ConfigError::Invalid(format!(
                "max_buffers ({}) is smaller than min_buffers ({})",
                self.max_buffers, self.min_buffers
            )));
        }
        if self.min_free_for_acquire == 0 || self.min_free_for_acquire > self.min_buffers {
            return Err(ConfigError::Invalid(format!(
                "min_free_for_acquire must be in 1..={} (got {})",
                self.min_buffers, self.min_free_for_acquire
            )));
        }
        if self.dynamic_scaling && (self.grow_after_stalls == 0 || self.shrink_after_idle_frames == 0)
        {
            return Err(ConfigError::Invalid(
                "scaling thresholds must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
