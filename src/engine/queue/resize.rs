use dpi::PhysicalSize;

use crate::engine::buffer::BufferProperties;
use crate::engine::error::QueueError;

use super::state::FreeSlot;
use super::{BufferQueue, allocate_set};

impl BufferQueue {
    /// ### English
    /// Reallocates the pool at a new size.
    ///
    /// All-or-nothing: the full replacement set is allocated outside the lock first; if any
    /// allocation fails the queue is left exactly as it was. Free buffers are swapped at once;
    /// buffers held by the producer, sitting in `ready` or owned by the consumer are swapped when
    /// they next return to `free`. Replacements carry new ids.
    ///
    /// #### Parameters
    /// - `size`: New buffer size in pixels.
    ///
    /// ### 中文
    /// 以新尺寸重新分配缓冲池。
    ///
    /// 要么全部成功要么全部失败：先在锁外分配完整的替换集合；任一分配失败时队列保持原样。
    /// 空闲缓冲区立即替换；生产者持有、位于 `ready` 或消费者持有的缓冲区在下次回到 `free`
    /// 时替换。替换缓冲区使用新的 id。
    ///
    /// #### 参数
    /// - `size`：新的缓冲区尺寸（像素）。
    pub fn resize(&self, size: PhysicalSize<u32>) -> Result<(), QueueError> {
        let (properties, count) = {
            let state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.properties.size == size {
                return Ok(());
            }
            (
                BufferProperties {
                    size,
                    ..state.properties
                },
                state.allocated(),
            )
        };

        let replacements = allocate_set(self.allocator.as_ref(), properties, count)?;

        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        state.properties = properties;
        state.replacements = replacements;
        let free: Vec<_> = state.free.drain(..).collect();
        for id in free {
            state.push_free(id, FreeSlot::Back);
        }
        state.assert_invariants();
        log::debug!(
            "buffer queue resized to {}x{} ({} buffers pending replacement)",
            size.width,
            size.height,
            state
                .buffers
                .values()
                .filter(|buffer| buffer.properties() != properties)
                .count()
        );
        drop(state);

        self.free_available.notify_all();
        Ok(())
    }
}
