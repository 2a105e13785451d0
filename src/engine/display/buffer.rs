//! ### English
//! Per-output consumer state: the attached queue, the last posted buffer (for reposts) and
//! buffers still waiting for their scanout completion signal.
//!
//! ### 中文
//! 每个输出的消费者状态：已绑定的队列、最近一次 post 的缓冲区（用于重发），以及仍在等待
//! 扫描输出完成信号的缓冲区。

use std::sync::Arc;

use crate::engine::buffer::{Buffer, BufferId, Fence};
use crate::engine::error::{PostError, QueueError};
use crate::engine::platform::{CompletionSignal, PostPrimitive};
use crate::engine::queue::{BufferQueue, ConsumerMode};

use super::OutputId;

/// ### English
/// What one display buffer put on screen during a tick.
///
/// ### 中文
/// 单个 display buffer 在一次 tick 中显示的内容。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Posted {
    Fresh {
        buffer: BufferId,
        seq: u64,
        submitted_frame: u64,
    },
    Repost {
        buffer: BufferId,
    },
}

struct PendingRelease {
    buffer: Buffer,
    fence: Arc<Fence>,
}

/// ### English
/// Consumer-side binding between one output and one surface queue.
///
/// ### 中文
/// 一个输出与一个 surface 队列之间的消费者侧绑定。
pub struct DisplayBuffer {
    output: OutputId,
    queue: Option<Arc<BufferQueue>>,
    /// ### English
    /// Buffer shown by the most recent successful post.
    ///
    /// ### 中文
    /// 最近一次成功 post 所显示的缓冲区。
    last_posted: Option<Buffer>,
    /// ### English
    /// Posted buffers the platform may still be reading (fence platforms only).
    ///
    /// ### 中文
    /// 平台可能仍在读取的已 post 缓冲区（仅限 fence 平台）。
    pending: Vec<PendingRelease>,
}

impl DisplayBuffer {
    pub(super) fn new(output: OutputId) -> Self {
        Self {
            output,
            queue: None,
            last_posted: None,
            pending: Vec::new(),
        }
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn queue(&self) -> Option<&Arc<BufferQueue>> {
        self.queue.as_ref()
    }

    pub fn last_posted(&self) -> Option<BufferId> {
        self.last_posted.as_ref().map(Buffer::id)
    }

    /// ### English
    /// Number of posted buffers still awaiting their completion signal.
    ///
    /// ### 中文
    /// 仍在等待完成信号的已 post 缓冲区数量。
    pub fn pending_releases(&self) -> usize {
        self.pending.len()
    }

    /// ### English
    /// Binds `queue` to this output, returning the previously bound queue (which is fully
    /// released first).
    ///
    /// ### 中文
    /// 将 `queue` 绑定到该输出，返回之前绑定的队列（会先将其完全释放）。
    pub(super) fn attach(&mut self, queue: Arc<BufferQueue>) -> Option<Arc<BufferQueue>> {
        let previous = self.detach();
        self.queue = Some(queue);
        previous
    }

    /// ### English
    /// Unbinds the queue, releasing every buffer this output still holds from it.
    ///
    /// ### 中文
    /// 解除队列绑定，并释放该输出仍持有的所有缓冲区。
    pub(super) fn detach(&mut self) -> Option<Arc<BufferQueue>> {
        let queue = self.queue.take()?;
        for pending in self.pending.drain(..) {
            release(self.output, &queue, &pending.buffer);
        }
        self.last_posted = None;
        Some(queue)
    }

    /// ### English
    /// Runs one consumer pass for this output: newest ready buffer if there is one, otherwise a
    /// repost of the last shown buffer. `Ok(None)` when there is nothing to show.
    ///
    /// #### Parameters
    /// - `post`: Platform post primitive.
    ///
    /// ### 中文
    /// 为该输出执行一次消费者流程：若有就绪缓冲区则取最新的，否则重发最近显示的缓冲区。
    /// 没有可显示内容时返回 `Ok(None)`。
    ///
    /// #### 参数
    /// - `post`：平台 post 原语。
    pub(super) fn post(&mut self, post: &dyn PostPrimitive) -> Result<Option<Posted>, PostError> {
        let Some(queue) = self.queue.clone() else {
            return Ok(None);
        };
        self.collect_completions(&queue);

        let (buffer, posted) = match queue.acquire_for_consumer(ConsumerMode::NonBlocking) {
            Ok(Some(frame)) => {
                if queue.producer_fences() {
                    let timeout = queue.producer_fence_timeout();
                    if !frame.buffer.ready_fence().wait_timeout(timeout) {
                        log::warn!(
                            "output {}: buffer {} not ready after {}ms, posting anyway",
                            self.output,
                            frame.buffer.id(),
                            timeout.as_millis()
                        );
                    }
                }
                let posted = Posted::Fresh {
                    buffer: frame.buffer.id(),
                    seq: frame.seq,
                    submitted_frame: frame.submitted_frame,
                };
                (frame.buffer, posted)
            }
            Ok(None) => match self.repost_candidate(&queue) {
                Some(buffer) => {
                    let posted = Posted::Repost {
                        buffer: buffer.id(),
                    };
                    (buffer, posted)
                }
                None => return Ok(None),
            },
            Err(QueueError::Closed) => {
                log::debug!("output {}: attached queue closed, detaching", self.output);
                self.detach();
                return Ok(None);
            }
            Err(err) => {
                log::error!("output {}: consumer acquire failed: {err}", self.output);
                return Ok(None);
            }
        };

        match post.post(self.output, &buffer) {
            Ok(signal) => {
                self.complete(&queue, &buffer, signal);
                self.last_posted = Some(buffer);
                self.collect_completions(&queue);
                Ok(Some(posted))
            }
            Err(err) => {
                if !self.is_pending(buffer.id()) {
                    release(self.output, &queue, &buffer);
                }
                Err(err)
            }
        }
    }

    fn repost_candidate(&mut self, queue: &BufferQueue) -> Option<Buffer> {
        let last = self.last_posted.clone()?;
        if self.is_pending(last.id()) {
            return Some(last);
        }
        match queue.reacquire_for_consumer(&last) {
            Ok(true) => Some(last),
            Ok(false) => {
                log::trace!(
                    "output {}: buffer {} was reused, nothing to repost",
                    self.output,
                    last.id()
                );
                self.last_posted = None;
                None
            }
            Err(err) => {
                log::debug!("output {}: cannot repost: {err}", self.output);
                self.last_posted = None;
                None
            }
        }
    }

    fn is_pending(&self, id: BufferId) -> bool {
        self.pending.iter().any(|pending| pending.buffer.id() == id)
    }

    fn complete(&mut self, queue: &BufferQueue, buffer: &Buffer, signal: CompletionSignal) {
        let existing = self
            .pending
            .iter()
            .position(|pending| pending.buffer.id() == buffer.id());

        match (signal, existing) {
            (CompletionSignal::Immediate, Some(index)) => {
                self.pending.remove(index);
                release(self.output, queue, buffer);
            }
            (CompletionSignal::Immediate, None) => release(self.output, queue, buffer),
            (CompletionSignal::Fence(fence), Some(index)) => self.pending[index].fence = fence,
            (CompletionSignal::Fence(fence), None) => self.pending.push(PendingRelease {
                buffer: buffer.clone(),
                fence,
            }),
        }
    }

    fn collect_completions(&mut self, queue: &BufferQueue) {
        let output = self.output;
        self.pending.retain(|pending| {
            if pending.fence.is_signaled() {
                release(output, queue, &pending.buffer);
                false
            } else {
                true
            }
        });
    }
}

impl Drop for DisplayBuffer {
    fn drop(&mut self) {
        self.detach();
    }
}

fn release(output: OutputId, queue: &BufferQueue, buffer: &Buffer) {
    if let Err(err) = queue.release_from_consumer(buffer) {
        log::error!("output {output}: failed to release buffer {}: {err}", buffer.id());
    }
}
