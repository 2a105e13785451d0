//! ### English
//! Queue teardown: wake every waiter and refuse further acquires.
//!
//! ### 中文
//! 队列拆除：唤醒所有等待者，并拒绝之后的 acquire。

use super::BufferQueue;
use super::state::QueueState;

impl BufferQueue {
    /// ### English
    /// Tears the queue down. Idempotent.
    ///
    /// Every blocked producer/consumer wakes with `QueueError::Closed`; later acquires and submits
    /// fail the same way. Consumer releases are still accepted so scanout can finish.
    ///
    /// ### 中文
    /// 拆除队列。可重复调用。
    ///
    /// 所有阻塞中的生产者/消费者都会以 `QueueError::Closed` 唤醒；之后的 acquire 与 submit
    /// 同样失败。消费者的 release 仍被接受，以便扫描输出完成。
    pub fn close(&self) {
        let mut state = self.state.lock();
        self.close_locked(&mut state);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(super) fn close_locked(&self, state: &mut QueueState) {
        if state.closed {
            return;
        }
        state.closed = true;
        self.free_available.notify_all();
        self.ready_available.notify_all();
        log::debug!(
            "buffer queue closed ({} buffers, {} submitted, {} dropped)",
            state.allocated(),
            state.stats.submitted,
            state.stats.dropped
        );
    }
}
