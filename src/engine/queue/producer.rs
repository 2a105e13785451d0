//! ### English
//! Producer side: acquire a free buffer, render, submit it as ready.
//!
//! ### 中文
//! 生产者侧：获取空闲缓冲区、渲染、提交为 ready。

use std::time::{Duration, Instant};

use crate::engine::buffer::Buffer;
use crate::engine::error::{ContractViolation, QueueError};

use super::state::ReadyEntry;
use super::{BufferQueue, Deadline, STARVATION_WARN_INTERVAL};

impl BufferQueue {
    /// ### English
    /// Takes a free buffer for rendering, blocking while fewer than `min_free_for_acquire`
    /// buffers are free.
    ///
    /// Wakes as soon as the consumer returns a buffer to `free`, or with `QueueError::Closed` when
    /// the queue is torn down. The producer may hold only one buffer at a time.
    ///
    /// ### 中文
    /// 获取一个用于渲染的空闲缓冲区；当空闲缓冲区少于 `min_free_for_acquire` 时阻塞。
    ///
    /// 消费者将缓冲区放回 `free` 时立即唤醒；队列拆除时返回 `QueueError::Closed`。
    /// 生产者同一时刻只能持有一个缓冲区。
    pub fn acquire_for_producer(&self) -> Result<Buffer, QueueError> {
        self.acquire_for_producer_until(Deadline::Never)?
            .ok_or(QueueError::Closed)
    }

    /// ### English
    /// Non-blocking variant: `Ok(None)` if acquiring would block.
    ///
    /// ### 中文
    /// 非阻塞版本：若需要阻塞则返回 `Ok(None)`。
    pub fn try_acquire_for_producer(&self) -> Result<Option<Buffer>, QueueError> {
        self.acquire_for_producer_until(Deadline::Immediate)
    }

    /// ### English
    /// Bounded variant: `Ok(None)` if no buffer became available within `timeout`.
    ///
    /// #### Parameters
    /// - `timeout`: Maximum time to wait.
    ///
    /// ### 中文
    /// 有界等待版本：若在 `timeout` 内没有可用缓冲区则返回 `Ok(None)`。
    ///
    /// #### 参数
    /// - `timeout`：最长等待时间。
    pub fn acquire_for_producer_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Buffer>, QueueError> {
        self.acquire_for_producer_until(Deadline::after(timeout))
    }

    fn acquire_for_producer_until(&self, deadline: Deadline) -> Result<Option<Buffer>, QueueError> {
        let min_free = self.config.min_free_for_acquire;
        let mut state = self.state.lock();
        let mut blocked_since: Option<Instant> = None;

        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            if let Some(held) = state.in_flight {
                log::error!("producer acquire while still holding buffer {held}");
                return Err(ContractViolation::ProducerAlreadyHolding { buffer: held }.into());
            }
            if state.producer_can_acquire(min_free) {
                break;
            }
            if matches!(deadline, Deadline::Immediate) {
                return Ok(None);
            }

            if blocked_since.is_none() {
                blocked_since = Some(Instant::now());
                state.stats.producer_stalls += 1;
                log::trace!(
                    "producer blocked: {} free, {} needed",
                    state.free.len(),
                    state.acquire_threshold(min_free)
                );
                if self.config.dynamic_scaling && self.note_stall(&mut state)? {
                    continue;
                }
            }

            match deadline {
                Deadline::Immediate => return Ok(None),
                Deadline::Never => {
                    let timed_out = self
                        .free_available
                        .wait_for(&mut state, STARVATION_WARN_INTERVAL)
                        .timed_out();
                    if timed_out && !state.closed && !state.producer_can_acquire(min_free) {
                        let waited = blocked_since.map(|since| since.elapsed()).unwrap_or_default();
                        log::warn!(
                            "producer starved for {}ms waiting for a free buffer",
                            waited.as_millis()
                        );
                    }
                }
                Deadline::At(at) => {
                    let timed_out = self.free_available.wait_until(&mut state, at).timed_out();
                    if timed_out && !state.closed && !state.producer_can_acquire(min_free) {
                        return Ok(None);
                    }
                }
            }
        }

        let id = state
            .free
            .pop_front()
            .expect("acquire predicate guarantees a free buffer");
        state.in_flight = Some(id);
        self.note_acquired(&mut state, blocked_since.is_some());

        let buffer = state
            .buffer(id)
            .cloned()
            .expect("free list only holds pool buffers");
        if self.producer_fences {
            buffer.ready_fence().reset();
        }
        state.assert_invariants();
        log::trace!("producer acquired buffer {id}");
        Ok(Some(buffer))
    }

    /// ### English
    /// Moves the producer's current buffer to `ready` and wakes the consumer.
    ///
    /// Signals the buffer's ready fence (writes are complete at submit). Returns the submission
    /// sequence number.
    ///
    /// #### Parameters
    /// - `buffer`: Must be the buffer most recently acquired by the producer.
    ///
    /// ### 中文
    /// 将生产者当前的缓冲区移入 `ready` 并唤醒消费者。
    ///
    /// 同时触发该缓冲区的就绪 fence（提交时写入已完成）。返回提交序号。
    ///
    /// #### 参数
    /// - `buffer`：必须是生产者最近一次获取的缓冲区。
    pub fn submit_from_producer(&self, buffer: &Buffer) -> Result<u64, QueueError> {
        self.submit(buffer, true)
    }

    /// ### English
    /// Like `submit_from_producer`, but leaves the ready fence for the producer to signal once
    /// its asynchronous writes finish. The consumer waits on it (bounded) before posting.
    ///
    /// ### 中文
    /// 与 `submit_from_producer` 相同，但不触发就绪 fence，由生产者在异步写入完成后自行触发。
    /// 消费者在 post 前会（有界地）等待它。
    pub fn submit_from_producer_unsignaled(&self, buffer: &Buffer) -> Result<u64, QueueError> {
        self.submit(buffer, false)
    }

    fn submit(&self, buffer: &Buffer, signal_ready: bool) -> Result<u64, QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if let Err(violation) = state.check_producer_owned(buffer.id()) {
            log::error!("rejected producer submit: {violation}");
            return Err(violation.into());
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.in_flight = None;
        state.ready.push_back(ReadyEntry {
            id: buffer.id(),
            seq,
            submitted_frame: self.clock.load(),
        });
        state.stats.submitted += 1;
        if signal_ready {
            buffer.ready_fence().signal();
        }
        state.assert_invariants();
        drop(state);

        self.ready_available.notify_one();
        log::trace!("producer submitted buffer {} as seq {seq}", buffer.id());
        Ok(seq)
    }
}
