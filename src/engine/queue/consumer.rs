//! ### English
//! Consumer side: take the newest ready buffer, post it, release it after scanout.
//!
//! ### 中文
//! 消费者侧：取最新的 ready 缓冲区，post，扫描输出结束后释放。

use std::time::Duration;

use crate::engine::buffer::Buffer;
use crate::engine::error::{ContractViolation, QueueError};

use super::state::FreeSlot;
use super::{BufferQueue, ConsumerFrame, ConsumerMode, Deadline};

impl BufferQueue {
    /// ### English
    /// Takes the newest ready buffer; older ready buffers are dropped back to `free` unseen.
    ///
    /// `NonBlocking` returns `Ok(None)` when nothing is ready; `Blocking` waits until a buffer is
    /// submitted or the queue is closed.
    ///
    /// #### Parameters
    /// - `mode`: Whether to wait for a ready buffer.
    ///
    /// ### 中文
    /// 取最新的 ready 缓冲区；更旧的 ready 缓冲区不显示，直接丢回 `free`。
    ///
    /// `NonBlocking` 在无就绪缓冲区时返回 `Ok(None)`；`Blocking` 会等待直到有缓冲区提交
    /// 或队列关闭。
    ///
    /// #### 参数
    /// - `mode`：是否等待就绪缓冲区。
    pub fn acquire_for_consumer(
        &self,
        mode: ConsumerMode,
    ) -> Result<Option<ConsumerFrame>, QueueError> {
        let deadline = match mode {
            ConsumerMode::NonBlocking => Deadline::Immediate,
            ConsumerMode::Blocking => Deadline::Never,
        };
        self.acquire_for_consumer_until(deadline)
    }

    /// ### English
    /// Waits at most `timeout` for a ready buffer.
    ///
    /// ### 中文
    /// 最多等待 `timeout` 以获取 ready 缓冲区。
    pub fn acquire_for_consumer_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<ConsumerFrame>, QueueError> {
        self.acquire_for_consumer_until(Deadline::after(timeout))
    }

    fn acquire_for_consumer_until(
        &self,
        deadline: Deadline,
    ) -> Result<Option<ConsumerFrame>, QueueError> {
        let mut state = self.state.lock();

        let newest = loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            if let Some(newest) = state.ready.pop_back() {
                break newest;
            }
            match deadline {
                Deadline::Immediate => return Ok(None),
                Deadline::Never => self.ready_available.wait(&mut state),
                Deadline::At(at) => {
                    let timed_out = self.ready_available.wait_until(&mut state, at).timed_out();
                    if timed_out && !state.closed && state.ready.is_empty() {
                        return Ok(None);
                    }
                }
            }
        };

        let mut dropped = 0;
        while let Some(superseded) = state.ready.pop_back() {
            log::debug!(
                "dropping superseded buffer {} (seq {}, newest seq {})",
                superseded.id,
                superseded.seq,
                newest.seq
            );
            state.push_free(superseded.id, FreeSlot::Front);
            dropped += 1;
        }
        state.stats.dropped += dropped;
        state.stats.consumed += 1;
        state.consumer_owned.push(newest.id);
        // The first scanout hold lowers the producer's threshold.
        let threshold_dropped = state.consumer_owned.len() == 1;

        let buffer = state
            .buffer(newest.id)
            .cloned()
            .expect("ready list only holds pool buffers");
        state.assert_invariants();
        drop(state);

        if dropped > 0 || threshold_dropped {
            self.free_available.notify_one();
        }
        log::trace!("consumer acquired buffer {} (seq {})", newest.id, newest.seq);
        Ok(Some(ConsumerFrame {
            buffer,
            seq: newest.seq,
            submitted_frame: newest.submitted_frame,
        }))
    }

    /// ### English
    /// Returns a consumer-held buffer to `free` once scanout no longer needs it, waking a blocked
    /// producer.
    ///
    /// Releasing a buffer the consumer does not hold (including a second release of the same
    /// buffer) is a contract violation and changes nothing. Accepted after `close`.
    ///
    /// #### Parameters
    /// - `buffer`: A buffer previously returned by `acquire_for_consumer`.
    ///
    /// ### 中文
    /// 扫描输出不再需要时，将消费者持有的缓冲区放回 `free`，并唤醒阻塞的生产者。
    ///
    /// 释放消费者未持有的缓冲区（包括对同一缓冲区的重复释放）属于契约违例，不会改变任何状态。
    /// `close` 之后仍然允许释放。
    ///
    /// #### 参数
    /// - `buffer`：之前由 `acquire_for_consumer` 返回的缓冲区。
    pub fn release_from_consumer(&self, buffer: &Buffer) -> Result<(), QueueError> {
        let id = buffer.id();
        let mut state = self.state.lock();
        let Some(index) = state.consumer_owned.iter().position(|owned| *owned == id) else {
            log::error!("rejected consumer release of buffer {id}: not held by the consumer");
            return Err(ContractViolation::NotConsumerOwned { buffer: id }.into());
        };

        state.consumer_owned.remove(index);
        state.push_free(id, FreeSlot::Back);
        state.assert_invariants();
        drop(state);

        self.free_available.notify_one();
        log::trace!("consumer released buffer {id}");
        Ok(())
    }

    /// ### English
    /// Takes `buffer` back from `free` so it can be posted again (idempotent repost).
    ///
    /// Returns `Ok(false)` if the buffer is no longer free (the producer took it, or a resize
    /// replaced it); the caller then has nothing to repost.
    ///
    /// ### 中文
    /// 从 `free` 中取回 `buffer` 以便再次 post（幂等重发）。
    ///
    /// 若该缓冲区已不在空闲列表中（被生产者取走或被 resize 替换），返回 `Ok(false)`，
    /// 调用方此时没有可重发的内容。
    pub fn reacquire_for_consumer(&self, buffer: &Buffer) -> Result<bool, QueueError> {
        let id = buffer.id();
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        let Some(index) = state.free.iter().position(|free| *free == id) else {
            return Ok(false);
        };

        state.free.remove(index);
        state.consumer_owned.push(id);
        state.assert_invariants();
        log::trace!("consumer reacquired buffer {id} for repost");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use crate::engine::error::{ContractViolation, QueueError};
    use crate::engine::queue::ConsumerMode;
    use crate::engine::queue::test_support::queue;

    #[test]
    fn non_blocking_acquire_on_empty_queue_returns_none() {
        let queue = queue(3);
        assert!(
            queue
                .acquire_for_consumer(ConsumerMode::NonBlocking)
                .unwrap()
                .is_none()
        );
        assert!(
            queue
                .acquire_for_consumer_timeout(Duration::from_millis(10))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn newest_ready_wins_and_older_ones_are_dropped() {
        let queue = queue(3);
        let a = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&a).unwrap();
        let b = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&b).unwrap();

        let frame = queue
            .acquire_for_consumer(ConsumerMode::NonBlocking)
            .unwrap()
            .unwrap();
        assert_eq!(frame.buffer.id(), b.id());
        assert_eq!(frame.seq, 2);

        let snapshot = queue.snapshot();
        assert!(snapshot.ready.is_empty());
        assert_eq!(snapshot.free.first(), Some(&a.id()));
        assert_eq!(snapshot.consumer_owned, vec![b.id()]);
        assert_eq!(queue.stats().dropped, 1);
    }

    #[test]
    fn blocking_acquire_wakes_on_submit() {
        let queue = queue(3);
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.acquire_for_consumer(ConsumerMode::Blocking))
        };

        thread::sleep(Duration::from_millis(20));
        let buffer = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&buffer).unwrap();

        let frame = consumer.join().unwrap().unwrap().unwrap();
        assert_eq!(frame.buffer.id(), buffer.id());
    }

    #[test]
    fn double_release_is_a_contract_violation() {
        let queue = queue(3);
        let buffer = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&buffer).unwrap();
        let frame = queue
            .acquire_for_consumer(ConsumerMode::NonBlocking)
            .unwrap()
            .unwrap();

        queue.release_from_consumer(&frame.buffer).unwrap();
        let before = queue.snapshot();
        let err = queue.release_from_consumer(&frame.buffer).unwrap_err();
        assert_eq!(
            err,
            QueueError::ContractViolation(ContractViolation::NotConsumerOwned {
                buffer: buffer.id()
            })
        );
        assert_eq!(queue.snapshot(), before);
        assert_eq!(before.free.len(), 3);
    }

    #[test]
    fn released_buffer_goes_last_and_can_be_reacquired_for_repost() {
        let queue = queue(3);
        let buffer = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&buffer).unwrap();
        let frame = queue
            .acquire_for_consumer(ConsumerMode::NonBlocking)
            .unwrap()
            .unwrap();
        queue.release_from_consumer(&frame.buffer).unwrap();
        assert_eq!(queue.snapshot().free.last(), Some(&buffer.id()));

        // The producer never gets the last scanned-out buffer while it is the only spare.
        let next = queue.acquire_for_producer().unwrap();
        assert_ne!(next.id(), buffer.id());

        assert!(queue.reacquire_for_consumer(&frame.buffer).unwrap());
        assert_eq!(queue.snapshot().consumer_owned, vec![buffer.id()]);
        assert!(!queue.reacquire_for_consumer(&frame.buffer).unwrap());
        queue.release_from_consumer(&frame.buffer).unwrap();
    }
}
