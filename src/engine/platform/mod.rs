//! ### English
//! Platform collaborators: buffer allocation and the post (swap/flip) primitive.
//!
//! Backends are injected as strategy objects bundled in `Platform` and selected once at
//! construction. The core only ever talks to the two traits below.
//!
//! ### 中文
//! 平台协作者：缓冲区分配与 post（swap/flip）原语。
//!
//! 后端以策略对象的形式注入，打包在 `Platform` 中，并在构造时一次性选定。
//! 核心只通过下面两个 trait 与平台交互。
mod headless;

use std::sync::Arc;

use crate::engine::buffer::{Buffer, BufferProperties, Fence};
use crate::engine::display::OutputId;
use crate::engine::error::{AllocationError, PostError};

pub use headless::{HeadlessCompletion, HeadlessPlatform, HeapStorage};

/// ### English
/// External buffer allocator.
///
/// Called at queue construction, on resize and when dynamic scaling grows the pool; never once
/// per frame.
///
/// ### 中文
/// 外部缓冲区分配器。
///
/// 仅在队列构造、resize 以及动态伸缩扩容时调用；不会每帧调用。
pub trait BufferAllocator: Send + Sync {
    fn allocate(&self, properties: BufferProperties) -> Result<Buffer, AllocationError>;
}

/// ### English
/// When the platform is done reading a posted buffer.
///
/// ### 中文
/// 平台何时不再读取已 post 的缓冲区。
#[derive(Clone, Debug)]
pub enum CompletionSignal {
    /// ### English
    /// The buffer can be released as soon as `post` returns.
    ///
    /// ### 中文
    /// `post` 返回后即可释放缓冲区。
    Immediate,
    /// ### English
    /// The buffer is still scanned out until the fence signals.
    ///
    /// ### 中文
    /// 在 fence 触发之前缓冲区仍在被扫描输出。
    Fence(Arc<Fence>),
}

impl CompletionSignal {
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Immediate => true,
            Self::Fence(fence) => fence.is_signaled(),
        }
    }
}

/// ### English
/// Platform post primitive. Called exactly once per tick per display buffer that has content.
///
/// ### 中文
/// 平台 post 原语。每个 tick 对每个有内容的 display buffer 恰好调用一次。
pub trait PostPrimitive: Send + Sync {
    /// ### English
    /// Hands `buffer` to scanout on `output`.
    ///
    /// #### Parameters
    /// - `output`: Target output.
    /// - `buffer`: Buffer to scan out; stays consumer-owned until the returned signal completes.
    ///
    /// ### 中文
    /// 将 `buffer` 交给 `output` 的扫描输出。
    ///
    /// #### 参数
    /// - `output`：目标输出。
    /// - `buffer`：要扫描输出的缓冲区；在返回的信号完成前一直归消费者所有。
    fn post(&self, output: OutputId, buffer: &Buffer) -> Result<CompletionSignal, PostError>;
}

/// ### English
/// The backend bundle chosen at construction.
///
/// ### 中文
/// 构造时选定的后端组合。
#[derive(Clone)]
pub struct Platform {
    pub allocator: Arc<dyn BufferAllocator>,
    pub post: Arc<dyn PostPrimitive>,
}

impl Platform {
    pub fn new(allocator: Arc<dyn BufferAllocator>, post: Arc<dyn PostPrimitive>) -> Self {
        Self { allocator, post }
    }

    /// ### English
    /// In-process backend: heap storage and immediate completion.
    ///
    /// ### 中文
    /// 进程内后端：堆内存存储，立即完成。
    pub fn headless() -> Self {
        Self::from_headless(Arc::new(HeadlessPlatform::new()))
    }

    pub fn from_headless(platform: Arc<HeadlessPlatform>) -> Self {
        Self {
            allocator: platform.clone(),
            post: platform,
        }
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
