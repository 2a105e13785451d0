use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::engine::buffer::{
    Buffer, BufferId, BufferIdAllocator, BufferProperties, Fence, NativeStorage,
};
use crate::engine::display::OutputId;
use crate::engine::error::{AllocationError, PostError};

use super::{BufferAllocator, CompletionSignal, PostPrimitive};

/// ### English
/// Largest dimension the headless allocator accepts.
///
/// ### 中文
/// 无头分配器接受的最大边长。
const MAX_DIMENSION: u32 = 16 * 1024;

/// ### English
/// Heap-backed pixel storage.
///
/// ### 中文
/// 基于堆内存的像素存储。
#[derive(Debug)]
pub struct HeapStorage {
    bytes: Mutex<Vec<u8>>,
}

impl HeapStorage {
    fn new(len: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ### English
    /// Runs `f` with exclusive access to the pixel bytes.
    ///
    /// ### 中文
    /// 以独占方式访问像素字节并执行 `f`。
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.bytes.lock())
    }
}

impl NativeStorage for HeapStorage {
    fn native_handle(&self) -> u64 {
        self.bytes.lock().as_ptr() as u64
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// ### English
/// How the headless post primitive reports completion.
///
/// ### 中文
/// 无头 post 原语报告完成的方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeadlessCompletion {
    /// ### English
    /// Buffers are released as soon as `post` returns.
    ///
    /// ### 中文
    /// `post` 返回后立即释放缓冲区。
    #[default]
    Immediate,
    /// ### English
    /// Page-flip behaviour: a buffer stays on screen until the next post on the same output,
    /// which signals its fence.
    ///
    /// ### 中文
    /// page-flip 行为：缓冲区一直显示到同一输出的下一次 post，届时其 fence 被触发。
    NextPost,
}

/// ### English
/// In-process platform used by tests and by hosts without a real display.
///
/// ### 中文
/// 供测试以及没有真实显示设备的宿主使用的进程内平台。
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    ids: BufferIdAllocator,
    completion: HeadlessCompletion,
    /// ### English
    /// Remaining allocations before `Exhausted` (`None` = unlimited).
    ///
    /// ### 中文
    /// 返回 `Exhausted` 之前剩余的分配次数（`None` = 不限）。
    allocation_budget: Mutex<Option<usize>>,
    allocations: AtomicUsize,
    posts: AtomicU64,
    on_screen: Mutex<HashMap<OutputId, (BufferId, Option<Arc<Fence>>)>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(completion: HeadlessCompletion) -> Self {
        Self {
            completion,
            ..Self::default()
        }
    }

    /// ### English
    /// Limits the number of further successful allocations (simulates memory exhaustion).
    ///
    /// ### 中文
    /// 限制后续成功分配的次数（模拟内存耗尽）。
    pub fn set_allocation_budget(&self, budget: Option<usize>) {
        *self.allocation_budget.lock() = budget;
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn posts(&self) -> u64 {
        self.posts.load(Ordering::Relaxed)
    }

    /// ### English
    /// Buffer currently scanned out on `output`, if any.
    ///
    /// ### 中文
    /// `output` 当前正在扫描输出的缓冲区（如有）。
    pub fn on_screen(&self, output: OutputId) -> Option<BufferId> {
        self.on_screen.lock().get(&output).map(|(id, _)| *id)
    }
}

impl BufferAllocator for HeadlessPlatform {
    fn allocate(&self, properties: BufferProperties) -> Result<Buffer, AllocationError> {
        let size = properties.size;
        if size.width == 0 || size.height == 0 || size.width > MAX_DIMENSION || size.height > MAX_DIMENSION
        {
            return Err(AllocationError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        {
            let mut budget = self.allocation_budget.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(AllocationError::Exhausted);
                }
                *remaining -= 1;
            }
        }

        self.allocations.fetch_add(1, Ordering::Relaxed);
        let storage = Arc::new(HeapStorage::new(properties.byte_len()));
        let buffer = Buffer::new(self.ids.next_id(), properties, storage);
        log::trace!("headless: allocated buffer {} ({}x{})", buffer.id(), size.width, size.height);
        Ok(buffer)
    }
}

impl PostPrimitive for HeadlessPlatform {
    fn post(&self, output: OutputId, buffer: &Buffer) -> Result<CompletionSignal, PostError> {
        self.posts.fetch_add(1, Ordering::Relaxed);

        let mut on_screen = self.on_screen.lock();
        match self.completion {
            HeadlessCompletion::Immediate => {
                on_screen.insert(output, (buffer.id(), None));
                Ok(CompletionSignal::Immediate)
            }
            HeadlessCompletion::NextPost => {
                let fence = Arc::new(Fence::new());
                let replaced = on_screen.insert(output, (buffer.id(), Some(fence.clone())));
                drop(on_screen);
                if let Some((_, Some(replaced))) = replaced {
                    replaced.signal();
                }
                Ok(CompletionSignal::Fence(fence))
            }
        }
    }
}
