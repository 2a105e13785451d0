use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dpi::PhysicalSize;
use parking_lot::{Mutex, RwLock};

use crate::engine::buffer::{Buffer, BufferId};
use crate::engine::config::QueueConfig;
use crate::engine::error::{QueueError, SurfaceError};
use crate::engine::frame::FrameClock;
use crate::engine::platform::BufferAllocator;
use crate::engine::queue::{BufferQueue, BufferQueueInit};

use super::id_map::SurfaceIdMap;
use super::{SurfaceHandle, SurfaceParams};

/// ### English
/// Source of registry generations. Starts at 1 so packed handles are never 0.
///
/// ### 中文
/// 注册表 generation 的来源。从 1 开始，保证打包后的句柄不为 0。
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

struct SurfaceEntry {
    queue: Arc<BufferQueue>,
    /// ### English
    /// Buffer the client is drawing into. Held for the whole of `swap_buffers`, so swaps on one
    /// surface are serialized without touching any other surface.
    ///
    /// ### 中文
    /// 客户端正在绘制的缓冲区。在整个 `swap_buffers` 期间持有该锁，因此同一 surface 上的
    /// swap 被串行化，且不会影响其它 surface。
    producer: Mutex<Option<Buffer>>,
}

/// ### English
/// Owns every live surface and its queue.
///
/// The map lock is only held to look entries up or insert/remove them; blocking producer work
/// happens on the entry after the map lock is released.
///
/// ### 中文
/// 持有所有存活的 surface 及其队列。
///
/// 仅在查找或插入/删除条目时持有映射锁；阻塞的生产者操作在释放映射锁之后针对条目进行。
pub struct SurfaceRegistry {
    generation: u32,
    next_id: AtomicU32,
    surfaces: RwLock<SurfaceIdMap<Arc<SurfaceEntry>>>,
    allocator: Arc<dyn BufferAllocator>,
    clock: Arc<FrameClock>,
    queue_config: QueueConfig,
}

impl SurfaceRegistry {
    /// ### English
    /// Creates an empty registry.
    ///
    /// #### Parameters
    /// - `allocator`: Allocator every surface queue uses.
    /// - `clock`: Frame clock shared with the display.
    /// - `queue_config`: Default sizing policy, adjusted per surface by its flags.
    ///
    /// ### 中文
    /// 创建一个空的注册表。
    ///
    /// #### 参数
    /// - `allocator`：所有 surface 队列使用的分配器。
    /// - `clock`：与显示端共享的帧时钟。
    /// - `queue_config`：默认的缓冲池策略，按每个 surface 的标志调整。
    pub fn new(
        allocator: Arc<dyn BufferAllocator>,
        clock: Arc<FrameClock>,
        queue_config: QueueConfig,
    ) -> Self {
        let generation = NEXT_GENERATION
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |generation| {
                Some(generation.checked_add(1).unwrap_or(1))
            })
            .unwrap_or(1);
        Self {
            generation,
            next_id: AtomicU32::new(1),
            surfaces: RwLock::new(SurfaceIdMap::default()),
            allocator,
            clock,
            queue_config,
        }
    }

    /// ### English
    /// Creates a surface: builds its queue and acquires the first buffer for the client.
    ///
    /// Allocation failures fail creation cleanly; nothing is registered.
    ///
    /// #### Parameters
    /// - `params`: Buffer properties and surface flags.
    ///
    /// ### 中文
    /// 创建 surface：构建其队列并为客户端获取第一个缓冲区。
    ///
    /// 分配失败时创建干净地失败，不会注册任何内容。
    ///
    /// #### 参数
    /// - `params`：缓冲区属性和 surface 标志。
    pub fn create_surface(&self, params: SurfaceParams) -> Result<SurfaceHandle, SurfaceError> {
        let mut config = if params.flags.double_buffered {
            QueueConfig::fixed(2)
        } else {
            self.queue_config.clone()
        };
        if params.flags.dynamic_scaling && !params.flags.double_buffered {
            config.dynamic_scaling = true;
        }

        let queue = BufferQueue::new(BufferQueueInit {
            properties: params.properties(),
            config,
            allocator: self.allocator.clone(),
            clock: self.clock.clone(),
            flags: params.flags,
        })?;
        let first = queue.acquire_for_producer()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(SurfaceEntry {
            queue,
            producer: Mutex::new(Some(first)),
        });
        self.surfaces.write().insert(id, entry);

        log::debug!(
            "created surface {id} ({}x{}, {:?}, flags {:#x})",
            params.size.width,
            params.size.height,
            params.format,
            params.flags.bits()
        );
        Ok(SurfaceHandle {
            id,
            generation: self.generation,
        })
    }

    /// ### English
    /// Destroys a surface, closing its queue so every thread waiting on it returns.
    ///
    /// ### 中文
    /// 销毁 surface，并关闭其队列，使所有在其上等待的线程返回。
    pub fn destroy_surface(&self, handle: SurfaceHandle) -> Result<(), SurfaceError> {
        self.check_generation(handle)?;
        let entry = self
            .surfaces
            .write()
            .remove(&handle.id)
            .ok_or(SurfaceError::UnknownSurface(handle.id))?;
        entry.queue.close();
        log::debug!("destroyed surface {}", handle.id);
        Ok(())
    }

    /// ### English
    /// Submits the buffer the client has drawn and blocks until the next one is available.
    /// Returns the id of the new current buffer.
    ///
    /// If the queue cannot allocate (dynamic scaling growth), the surface is torn down and the
    /// allocation error returned.
    ///
    /// ### 中文
    /// 提交客户端已绘制完成的缓冲区，并阻塞直到下一个缓冲区可用。返回新的当前缓冲区 id。
    ///
    /// 若队列无法分配缓冲区（动态伸缩扩容时），该 surface 会被拆除并返回分配错误。
    pub fn swap_buffers(&self, handle: SurfaceHandle) -> Result<BufferId, SurfaceError> {
        let entry = self.entry(handle)?;
        let mut producer = entry.producer.lock();

        if let Some(buffer) = producer.as_ref() {
            entry.queue.submit_from_producer(buffer)?;
            *producer = None;
        }

        match entry.queue.acquire_for_producer() {
            Ok(next) => {
                let id = next.id();
                *producer = Some(next);
                Ok(id)
            }
            Err(QueueError::Allocation(err)) => {
                drop(producer);
                log::error!("surface {} torn down: {err}", handle.id);
                self.surfaces.write().remove(&handle.id);
                entry.queue.close();
                Err(QueueError::Allocation(err).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// ### English
    /// Id of the buffer the client is currently drawing into.
    ///
    /// ### 中文
    /// 客户端当前正在绘制的缓冲区 id。
    pub fn current_buffer_id(&self, handle: SurfaceHandle) -> Result<BufferId, SurfaceError> {
        let entry = self.entry(handle)?;
        entry
            .queue
            .producer_buffer()
            .map(|buffer| buffer.id())
            .ok_or(SurfaceError::NoCurrentBuffer(handle.id))
    }

    /// ### English
    /// Reallocates the surface's buffers at `size` (all-or-nothing).
    ///
    /// ### 中文
    /// 以 `size` 重新分配 surface 的缓冲区（要么全部成功要么全部失败）。
    pub fn resize_surface(
        &self,
        handle: SurfaceHandle,
        size: PhysicalSize<u32>,
    ) -> Result<(), SurfaceError> {
        let entry = self.entry(handle)?;
        entry.queue.resize(size)?;
        Ok(())
    }

    pub fn validate(&self, handle: SurfaceHandle) -> bool {
        self.entry(handle).is_ok()
    }

    pub fn queue(&self, handle: SurfaceHandle) -> Result<Arc<BufferQueue>, SurfaceError> {
        Ok(self.entry(handle)?.queue.clone())
    }

    pub fn len(&self) -> usize {
        self.surfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.read().is_empty()
    }

    /// ### English
    /// Destroys every surface.
    ///
    /// ### 中文
    /// 销毁所有 surface。
    pub fn close_all(&self) {
        let entries: Vec<_> = self.surfaces.write().drain().collect();
        for (id, entry) in entries {
            entry.queue.close();
            log::debug!("closed surface {id}");
        }
    }

    fn check_generation(&self, handle: SurfaceHandle) -> Result<(), SurfaceError> {
        if handle.generation != self.generation {
            return Err(SurfaceError::StaleHandle);
        }
        Ok(())
    }

    fn entry(&self, handle: SurfaceHandle) -> Result<Arc<SurfaceEntry>, SurfaceError> {
        self.check_generation(handle)?;
        self.surfaces
            .read()
            .get(&handle.id)
            .cloned()
            .ok_or(SurfaceError::UnknownSurface(handle.id))
    }
}

impl Drop for SurfaceRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel as channel;

    use super::*;
    use crate::engine::error::AllocationError;
    use crate::engine::flags::SurfaceFlags;
    use crate::engine::platform::HeadlessPlatform;
    use crate::engine::queue::ConsumerMode;

    fn registry() -> (SurfaceRegistry, Arc<HeadlessPlatform>) {
        let platform = Arc::new(HeadlessPlatform::new());
        let registry = SurfaceRegistry::new(
            platform.clone(),
            Arc::new(FrameClock::new()),
            QueueConfig::default(),
        );
        (registry, platform)
    }

    fn params() -> SurfaceParams {
        SurfaceParams::new(PhysicalSize::new(16, 16))
    }

    #[test]
    fn create_swap_and_destroy() {
        let (registry, platform) = registry();
        let handle = registry.create_surface(params()).unwrap();
        assert_ne!(handle.to_raw(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(platform.allocations(), 3);

        let first = registry.current_buffer_id(handle).unwrap();
        let queue = registry.queue(handle).unwrap();

        let second = registry.swap_buffers(handle).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.current_buffer_id(handle).unwrap(), second);

        let frame = queue
            .acquire_for_consumer(ConsumerMode::NonBlocking)
            .unwrap()
            .unwrap();
        assert_eq!(frame.buffer.id(), first);
        assert_eq!(frame.seq, 1);

        registry.destroy_surface(handle).unwrap();
        assert!(queue.is_closed());
        assert!(!registry.validate(handle));
        assert_eq!(
            registry.swap_buffers(handle).unwrap_err(),
            SurfaceError::UnknownSurface(handle.id)
        );
    }

    #[test]
    fn handles_from_another_registry_are_stale() {
        let (first, _) = registry();
        let (second, _) = registry();
        let handle = first.create_surface(params()).unwrap();
        assert_eq!(
            second.current_buffer_id(handle).unwrap_err(),
            SurfaceError::StaleHandle
        );
    }

    #[test]
    fn flags_select_the_queue_policy() {
        let (registry, platform) = registry();
        let double = registry
            .create_surface(params().with_flags(SurfaceFlags {
                double_buffered: true,
                ..SurfaceFlags::default()
            }))
            .unwrap();
        assert_eq!(registry.queue(double).unwrap().config().max_buffers, 2);
        assert_eq!(platform.allocations(), 2);

        let scaling = registry
            .create_surface(params().with_flags(SurfaceFlags {
                dynamic_scaling: true,
                ..SurfaceFlags::default()
            }))
            .unwrap();
        let queue = registry.queue(scaling).unwrap();
        assert!(queue.config().dynamic_scaling);
        assert_eq!(queue.stats().allocated, 2);
    }

    #[test]
    fn failed_allocation_registers_nothing() {
        let (registry, platform) = registry();
        platform.set_allocation_budget(Some(1));
        let err = registry.create_surface(params()).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::Queue(QueueError::Allocation(AllocationError::Exhausted))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn destroy_unblocks_a_waiting_swap() {
        let (registry, _platform) = registry();
        let registry = Arc::new(registry);
        let handle = registry
            .create_surface(params().with_flags(SurfaceFlags {
                double_buffered: true,
                ..SurfaceFlags::default()
            }))
            .unwrap();
        // Nothing consumes, so the swap has to wait for a free buffer.
        let (done_tx, done_rx) = channel::bounded(1);
        let swapper = {
            let registry = registry.clone();
            thread::spawn(move || {
                let result = registry.swap_buffers(handle);
                let _ = done_tx.send(result);
            })
        };

        thread::sleep(Duration::from_millis(20));
        registry.destroy_surface(handle).unwrap();
        let result = done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(result.unwrap_err(), SurfaceError::Queue(QueueError::Closed));
        swapper.join().unwrap();
    }
}
