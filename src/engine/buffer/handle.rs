use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dpi::PhysicalSize;

use super::{BufferId, BufferProperties, BufferUsage, Fence, PixelFormat};

/// ### English
/// Opaque backing storage supplied by an allocator (GPU image, dumb buffer, heap memory...).
///
/// The core never looks inside; platform code downcasts through `as_any`.
///
/// ### 中文
/// 由分配器提供的不透明底层存储（GPU 图像、dumb buffer、堆内存等）。
///
/// 核心从不查看其内部；平台代码通过 `as_any` 向下转型。
pub trait NativeStorage: Send + Sync + fmt::Debug {
    /// ### English
    /// Platform handle value (fd, GEM name, pointer...), or 0 when there is none.
    ///
    /// ### 中文
    /// 平台句柄值（fd、GEM name、指针等），没有时为 0。
    fn native_handle(&self) -> u64;

    fn as_any(&self) -> &dyn Any;
}

struct BufferInner {
    id: BufferId,
    properties: BufferProperties,
    storage: Arc<dyn NativeStorage>,
    /// ### English
    /// Producer-ready indicator (signaled when writes into the buffer are complete).
    ///
    /// ### 中文
    /// 生产者就绪标记（写入缓冲区完成时触发）。
    ready: Fence,
}

/// ### English
/// Shared handle to one pool allocation.
///
/// Equality and hashing follow `id`.
///
/// ### 中文
/// 指向缓冲池中某个分配的共享句柄。
///
/// 相等性与哈希基于 `id`。
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// ### English
    /// Wraps freshly allocated storage. The ready fence starts signaled (nothing pending).
    ///
    /// #### Parameters
    /// - `id`: Unique id handed out by the allocator.
    /// - `properties`: Size, format and usage the storage was allocated with.
    /// - `storage`: Backing storage.
    ///
    /// ### 中文
    /// 包装新分配的存储。就绪 fence 初始为已触发（没有待完成的写入）。
    ///
    /// #### 参数
    /// - `id`：分配器分配的唯一 id。
    /// - `properties`：分配存储时使用的尺寸、格式与用途。
    /// - `storage`：底层存储。
    pub fn new(id: BufferId, properties: BufferProperties, storage: Arc<dyn NativeStorage>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id,
                properties,
                storage,
                ready: Fence::signaled(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.inner.properties.size
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.inner.properties.format
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.inner.properties.usage
    }

    #[inline]
    pub fn properties(&self) -> BufferProperties {
        self.inner.properties
    }

    pub fn stride(&self) -> u32 {
        self.inner.properties.stride()
    }

    pub fn byte_len(&self) -> usize {
        self.inner.properties.byte_len()
    }

    pub fn storage(&self) -> &Arc<dyn NativeStorage> {
        &self.inner.storage
    }

    /// ### English
    /// Producer-ready fence; the consumer waits on it before posting.
    ///
    /// ### 中文
    /// 生产者就绪 fence；消费者在 post 前等待它。
    pub fn ready_fence(&self) -> &Fence {
        &self.inner.ready
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Buffer {}

impl std::hash::Hash for Buffer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.inner.id)
            .field("size", &self.inner.properties.size)
            .field("format", &self.inner.properties.format)
            .finish_non_exhaustive()
    }
}
