//! ### English
//! Error taxonomy for the compositor core.
//!
//! - Contract violations are caller bugs: signaled immediately, never change queue state.
//! - Allocation failures are fatal to the surface that needed the buffer.
//! - `Closed` means the queue was torn down and will never hand out buffers again.
//! - Post failures belong to one sync group and never corrupt queue state.
//!
//! ### 中文
//! 合成器核心的错误分类。
//!
//! - 契约违例属于调用方 bug：立即报告，且不会改变队列状态。
//! - 分配失败对需要该缓冲区的 surface 是致命的。
//! - `Closed` 表示队列已拆除，之后永远不会再分配缓冲区。
//! - post 失败只影响单个同步组，不会破坏队列状态。

use thiserror::Error;

use crate::engine::buffer::BufferId;
use crate::engine::display::OutputId;

/// ### English
/// Failure reported by the external buffer allocator.
///
/// ### 中文
/// 外部缓冲区分配器报告的失败。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("buffer allocator is out of memory")]
    Exhausted,
    #[error("pixel format is not supported by the allocator")]
    UnsupportedFormat,
    #[error("invalid buffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("allocator backend error: {0}")]
    Backend(String),
}

/// ### English
/// A caller broke the producer/consumer ownership contract.
///
/// ### 中文
/// 调用方违反了生产者/消费者的所有权契约。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("buffer {buffer} is not owned by the producer")]
    NotProducerOwned { buffer: BufferId },
    #[error("producer submitted buffer {got} but its current buffer is {expected}")]
    NotCurrentBuffer { expected: BufferId, got: BufferId },
    #[error("buffer {buffer} is not held by the consumer")]
    NotConsumerOwned { buffer: BufferId },
    #[error("buffer {buffer} does not belong to this queue")]
    UnknownBuffer { buffer: BufferId },
    #[error("producer already holds buffer {buffer}")]
    ProducerAlreadyHolding { buffer: BufferId },
}

/// ### English
/// Errors returned by `BufferQueue` operations.
///
/// ### 中文
/// `BufferQueue` 操作返回的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// ### English
    /// The queue was torn down; retrying will never succeed.
    ///
    /// ### 中文
    /// 队列已拆除；重试永远不会成功。
    #[error("buffer queue is closed")]
    Closed,
    #[error("buffer allocation failed: {0}")]
    Allocation(#[from] AllocationError),
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
}

/// ### English
/// Failure of the platform post (swap/flip) primitive.
///
/// ### 中文
/// 平台 post（swap/flip）原语的失败。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("post rejected by platform: {0}")]
    Rejected(String),
    #[error("display device lost")]
    DeviceLost,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("invalid or inconsistent display configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unknown output {0}")]
    UnknownOutput(OutputId),
    #[error("display is paused")]
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("unknown surface {0}")]
    UnknownSurface(u32),
    #[error("surface handle is stale")]
    StaleHandle,
    #[error("surface {0} holds no buffer (a swap is in progress or its queue is closed)")]
    NoCurrentBuffer(u32),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// ### English
/// Failure constructing or using a `CompositorRuntime`.
///
/// ### 中文
/// 构造或使用 `CompositorRuntime` 时的失败。
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("compositor is shut down")]
    ShutDown,
}
