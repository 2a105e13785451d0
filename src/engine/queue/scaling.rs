//! ### English
//! Dynamic queue scaling: grow toward `max_buffers` when the producer keeps stalling, shrink
//! toward `min_buffers` when buffers sit unused.
//!
//! Growing first unparks an already allocated buffer; only when none is parked does it allocate
//! (outside the lock). Shrinking never frees memory, it parks one buffer.
//!
//! ### 中文
//! 动态队列伸缩：生产者持续阻塞时向 `max_buffers` 扩张；缓冲区闲置时向 `min_buffers` 收缩。
//!
//! 扩容时优先解除一个已分配缓冲区的停放；只有没有停放缓冲区时才（在锁外）分配。
//! 收缩从不释放内存，只是停放一个缓冲区。

use parking_lot::MutexGuard;

use crate::engine::error::QueueError;

use super::BufferQueue;
use super::state::{FreeSlot, QueueState};

impl BufferQueue {
    /// ### English
    /// Records one blocked acquire; grows the capacity once the stall threshold is reached.
    /// Returns whether the capacity grew.
    ///
    /// ### 中文
    /// 记录一次阻塞的 acquire；达到阈值后扩大容量。返回容量是否增长。
    pub(super) fn note_stall(
        &self,
        state: &mut MutexGuard<'_, QueueState>,
    ) -> Result<bool, QueueError> {
        let scaling = &mut state.scaling;
        scaling.consecutive_idle = 0;
        scaling.consecutive_stalls += 1;
        if scaling.consecutive_stalls < self.config.grow_after_stalls
            || scaling.effective_capacity >= self.config.max_buffers
            || scaling.growing
        {
            return Ok(false);
        }
        scaling.consecutive_stalls = 0;
        self.grow(state)
    }

    fn grow(&self, state: &mut MutexGuard<'_, QueueState>) -> Result<bool, QueueError> {
        let target = state.scaling.effective_capacity + 1;
        if state.allocated() >= target {
            state.scaling.effective_capacity = target;
            log::debug!("buffer queue capacity grew to {target} (unparked)");
            return Ok(true);
        }

        let properties = state.properties;
        state.scaling.growing = true;
        let allocated = MutexGuard::unlocked(state, || self.allocator.allocate(properties));
        state.scaling.growing = false;

        match allocated {
            Ok(buffer) => {
                if state.closed {
                    return Ok(false);
                }
                if buffer.properties() != state.properties {
                    log::debug!("discarding growth buffer {} allocated before a resize", buffer.id());
                    return Ok(false);
                }
                let id = buffer.id();
                state.buffers.insert(id, buffer);
                state.push_free(id, FreeSlot::Front);
                state.scaling.effective_capacity =
                    (state.scaling.effective_capacity + 1).min(self.config.max_buffers);
                state.assert_invariants();
                log::debug!(
                    "buffer queue capacity grew to {} (allocated buffer {id})",
                    state.scaling.effective_capacity
                );
                Ok(true)
            }
            Err(err) => {
                log::error!("buffer allocation failed while growing the queue: {err}");
                self.close_locked(state);
                Err(QueueError::Allocation(err))
            }
        }
    }

    /// ### English
    /// Updates the scaling counters after a successful producer acquire.
    ///
    /// ### 中文
    /// 在生产者 acquire 成功后更新伸缩计数器。
    pub(super) fn note_acquired(&self, state: &mut QueueState, blocked: bool) {
        if !self.config.dynamic_scaling || blocked {
            return;
        }

        state.scaling.consecutive_stalls = 0;
        let surplus = state.free.len() >= state.acquire_threshold(self.config.min_free_for_acquire);
        if !surplus {
            state.scaling.consecutive_idle = 0;
            return;
        }

        state.scaling.consecutive_idle += 1;
        if state.scaling.consecutive_idle >= self.config.shrink_after_idle_frames
            && state.scaling.effective_capacity > self.config.min_buffers
        {
            state.scaling.consecutive_idle = 0;
            state.scaling.effective_capacity -= 1;
            log::debug!(
                "buffer queue capacity shrank to {} ({} parked)",
                state.scaling.effective_capacity,
                state.parked()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use crate::engine::config::QueueConfig;
    use crate::engine::error::{AllocationError, QueueError};
    use crate::engine::queue::ConsumerMode;
    use crate::engine::queue::test_support::queue_with;

    fn scaling_config() -> QueueConfig {
        QueueConfig {
            min_buffers: 2,
            max_buffers: 3,
            min_free_for_acquire: 2,
            dynamic_scaling: true,
            grow_after_stalls: 1,
            shrink_after_idle_frames: 2,
            ..QueueConfig::default()
        }
    }

    #[test]
    fn stalled_producer_grows_the_pool_lazily() {
        let (queue, platform, _) = queue_with(scaling_config());
        assert_eq!(platform.allocations(), 2);

        let first = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&first).unwrap();

        // Only one free buffer left: the stall immediately triggers growth.
        let second = queue.acquire_for_producer().unwrap();
        assert_eq!(platform.allocations(), 3);
        let stats = queue.stats();
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.allocated, 3);
        assert_eq!(stats.producer_stalls, 1);
        queue.submit_from_producer(&second).unwrap();
    }

    #[test]
    fn idle_acquires_shrink_capacity_without_freeing() {
        let (queue, _, _) = queue_with(QueueConfig {
            grow_after_stalls: 1,
            shrink_after_idle_frames: 1,
            ..scaling_config()
        });

        let first = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&first).unwrap();
        let second = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&second).unwrap();
        assert_eq!(queue.stats().capacity, 3);

        // Drain everything so the pool is idle.
        let frame = queue
            .acquire_for_consumer(ConsumerMode::NonBlocking)
            .unwrap()
            .unwrap();
        queue.release_from_consumer(&frame.buffer).unwrap();

        let third = queue.acquire_for_producer().unwrap();
        let stats = queue.stats();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.allocated, 3);
        assert_eq!(queue.snapshot().allocated.len(), 3);
        queue.submit_from_producer(&third).unwrap();
    }

    #[test]
    fn growth_allocation_failure_tears_the_queue_down() {
        let (queue, platform, _) = queue_with(scaling_config());
        platform.set_allocation_budget(Some(0));

        let first = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&first).unwrap();

        let err = queue.acquire_for_producer().unwrap_err();
        assert_eq!(err, QueueError::Allocation(AllocationError::Exhausted));
        assert!(queue.is_closed());
        assert_eq!(queue.acquire_for_producer().unwrap_err(), QueueError::Closed);
    }

    #[test]
    fn fixed_pool_never_grows() {
        let (queue, platform, _) = queue_with(QueueConfig::fixed(2));
        let first = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&first).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || tx.send(queue.acquire_for_producer().map(|b| b.id())).unwrap())
        };
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(platform.allocations(), 2);

        queue.close();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(QueueError::Closed)
        );
        producer.join().unwrap();
    }
}
