//! ### English
//! Bounded buffer queue between one producer (a client surface) and one consumer (a display).
//!
//! Buffers move `free -> in_flight -> ready -> consumer_owned -> free`. The consumer always takes
//! the newest ready buffer and drops older ones back to `free`, so frames are shown in submission
//! order and a frame is never shown after a newer one.
//!
//! One mutex guards all state; two condition variables wake the producer ("free buffer
//! available") and the consumer ("ready buffer available"). Every wait re-checks its predicate,
//! including the torn-down flag set by `close`.
//!
//! ### 中文
//! 一个生产者（客户端 surface）与一个消费者（显示端）之间的有界缓冲队列。
//!
//! 缓冲区按 `free -> in_flight -> ready -> consumer_owned -> free` 流转。消费者总是取最新的
//! ready 缓冲区，并将更旧的缓冲区丢回 `free`，因此帧按提交顺序显示，且较新的帧显示之后
//! 不会再显示更旧的帧。
//!
//! 一把互斥锁保护全部状态；两个条件变量分别唤醒生产者（“有空闲缓冲区”）与消费者
//! （“有就绪缓冲区”）。每次等待都会重新检查谓词，包括 `close` 设置的拆除标记。
mod consumer;
mod producer;
mod resize;
mod scaling;
mod state;
mod teardown;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::engine::buffer::{Buffer, BufferId, BufferProperties};
use crate::engine::config::QueueConfig;
use crate::engine::error::{AllocationError, QueueError};
use crate::engine::flags::SurfaceFlags;
use crate::engine::frame::FrameClock;
use crate::engine::platform::BufferAllocator;

use state::QueueState;

/// ### English
/// How long a blocked producer waits before logging a starvation warning (and waiting again).
///
/// ### 中文
/// 阻塞的生产者在记录饥饿警告（并继续等待）之前的等待时长。
const STARVATION_WARN_INTERVAL: Duration = Duration::from_secs(1);

/// ### English
/// Consumer acquire mode.
///
/// ### 中文
/// 消费者 acquire 模式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerMode {
    /// ### English
    /// Return `None` immediately if nothing is ready.
    ///
    /// ### 中文
    /// 没有就绪缓冲区时立即返回 `None`。
    NonBlocking,
    /// ### English
    /// Wait until a buffer is ready (or the queue is closed).
    ///
    /// ### 中文
    /// 等待直到有缓冲区就绪（或队列关闭）。
    Blocking,
}

/// ### English
/// A buffer handed to the consumer, with the submission metadata needed for latency accounting.
///
/// ### 中文
/// 交给消费者的缓冲区，以及延迟统计所需的提交元数据。
#[derive(Clone, Debug)]
pub struct ConsumerFrame {
    pub buffer: Buffer,
    /// ### English
    /// Submission sequence number (1-based, unique, monotonic per queue).
    ///
    /// ### 中文
    /// 提交序号（从 1 开始，在队列内唯一且单调）。
    pub seq: u64,
    /// ### English
    /// `FrameClock` value observed when the producer submitted the buffer.
    ///
    /// ### 中文
    /// 生产者提交该缓冲区时观察到的 `FrameClock` 值。
    pub submitted_frame: u64,
}

/// ### English
/// Counters for diagnostics.
///
/// ### 中文
/// 诊断用计数器。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub consumed: u64,
    /// ### English
    /// Ready buffers superseded before the consumer picked them up.
    ///
    /// ### 中文
    /// 在被消费者取走之前就被更新帧取代的 ready 缓冲区数量。
    pub dropped: u64,
    pub producer_stalls: u64,
    pub capacity: usize,
    pub allocated: usize,
}

/// ### English
/// Per-set buffer ids at one instant.
///
/// ### 中文
/// 某一时刻各集合中的缓冲区 id。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub free: Vec<BufferId>,
    pub in_flight: Option<BufferId>,
    pub ready: Vec<BufferId>,
    pub consumer_owned: Vec<BufferId>,
    pub allocated: Vec<BufferId>,
    pub effective_capacity: usize,
    pub closed: bool,
}

/// ### English
/// Deadline for a blocking operation.
///
/// ### 中文
/// 阻塞操作的截止时间。
#[derive(Clone, Copy, Debug)]
enum Deadline {
    Immediate,
    Never,
    At(Instant),
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(at) => Self::At(at),
            None => Self::Never,
        }
    }
}

pub struct BufferQueueInit {
    pub properties: BufferProperties,
    pub config: QueueConfig,
    pub allocator: Arc<dyn BufferAllocator>,
    pub clock: Arc<FrameClock>,
    pub flags: SurfaceFlags,
}

/// ### English
/// Buffer queue for one surface.
///
/// ### 中文
/// 单个 surface 的缓冲队列。
pub struct BufferQueue {
    state: Mutex<QueueState>,
    /// ### English
    /// Signaled when a buffer enters `free` (or on teardown).
    ///
    /// ### 中文
    /// 有缓冲区进入 `free`（或拆除）时触发。
    free_available: Condvar,
    /// ### English
    /// Signaled when a buffer enters `ready` (or on teardown).
    ///
    /// ### 中文
    /// 有缓冲区进入 `ready`（或拆除）时触发。
    ready_available: Condvar,
    config: QueueConfig,
    allocator: Arc<dyn BufferAllocator>,
    clock: Arc<FrameClock>,
    /// ### English
    /// If false, ready fences are never reset and the consumer does not wait on them.
    ///
    /// ### 中文
    /// 为 false 时不重置 ready fence，消费者也不会等待它们。
    producer_fences: bool,
}

impl BufferQueue {
    /// ### English
    /// Creates a queue and allocates its initial pool.
    ///
    /// All-or-nothing: if any allocation fails, nothing is kept and the error is returned.
    ///
    /// #### Parameters
    /// - `init`: Buffer properties, sizing policy, allocator, shared frame clock and flags.
    ///
    /// ### 中文
    /// 创建队列并分配初始缓冲池。
    ///
    /// 要么全部成功要么全部失败：任一分配失败都不会保留任何缓冲区，并返回该错误。
    ///
    /// #### 参数
    /// - `init`：缓冲区属性、容量策略、分配器、共享帧时钟与标志位。
    pub fn new(init: BufferQueueInit) -> Result<Arc<Self>, QueueError> {
        let BufferQueueInit {
            properties,
            config,
            allocator,
            clock,
            flags,
        } = init;

        config
            .validate()
            .map_err(|err| QueueError::InvalidConfig(err.to_string()))?;

        let initial = config.initial_buffers();
        let buffers = allocate_set(allocator.as_ref(), properties, initial)?;
        log::debug!(
            "buffer queue created: {} buffers of {}x{} {:?} (capacity {}..={}, scaling {})",
            initial,
            properties.size.width,
            properties.size.height,
            properties.format,
            config.min_buffers,
            config.max_buffers,
            config.dynamic_scaling,
        );

        Ok(Arc::new(Self {
            state: Mutex::new(QueueState::new(properties, buffers, initial)),
            free_available: Condvar::new(),
            ready_available: Condvar::new(),
            config,
            allocator,
            clock,
            producer_fences: !flags.unsafe_no_producer_fence,
        }))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn properties(&self) -> BufferProperties {
        self.state.lock().properties
    }

    #[inline]
    pub fn producer_fences(&self) -> bool {
        self.producer_fences
    }

    pub fn producer_fence_timeout(&self) -> Duration {
        Duration::from_millis(self.config.producer_fence_timeout_ms)
    }

    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().snapshot()
    }

    /// ### English
    /// The buffer the producer currently holds, if any.
    ///
    /// ### 中文
    /// 生产者当前持有的缓冲区（如有）。
    pub fn producer_buffer(&self) -> Option<Buffer> {
        let state = self.state.lock();
        state.in_flight.and_then(|id| state.buffer(id).cloned())
    }
}

/// ### English
/// Allocates `count` buffers; on the first failure the partial set is dropped.
///
/// ### 中文
/// 分配 `count` 个缓冲区；首次失败时丢弃已分配的部分。
fn allocate_set(
    allocator: &dyn BufferAllocator,
    properties: BufferProperties,
    count: usize,
) -> Result<Vec<Buffer>, AllocationError> {
    (0..count)
        .map(|_| allocator.allocate(properties))
        .collect::<Result<Vec<_>, _>>()
        .inspect_err(|err| log::error!("buffer allocation failed: {err}"))
}
