//! ### English
//! Lock-protected queue state: the disjoint buffer sets and their bookkeeping.
//!
//! Every transition happens with the queue mutex held. `assert_invariants` checks, in debug
//! builds, that the sets are disjoint and that their union is exactly the allocated pool.
//!
//! ### 中文
//! 受锁保护的队列状态：互不相交的缓冲区集合及其簿记信息。
//!
//! 所有状态转换都在持有队列互斥锁时进行。`assert_invariants` 在 debug 构建中检查
//! 各集合互不相交，且其并集恰好等于已分配的缓冲池。

use std::collections::{BTreeMap, VecDeque};

use crate::engine::buffer::{Buffer, BufferId, BufferProperties};
use crate::engine::error::ContractViolation;

use super::{QueueSnapshot, QueueStats};

/// ### English
/// One submitted buffer awaiting consumer pickup.
///
/// ### 中文
/// 一个已提交、等待消费者取走的缓冲区。
#[derive(Clone, Copy, Debug)]
pub(super) struct ReadyEntry {
    pub id: BufferId,
    pub seq: u64,
    pub submitted_frame: u64,
}

/// ### English
/// Dynamic scaling bookkeeping.
///
/// ### 中文
/// 动态伸缩的簿记信息。
#[derive(Debug)]
pub(super) struct ScalingState {
    /// ### English
    /// Buffers the producer may currently cycle through (`min_buffers..=max_buffers`).
    ///
    /// ### 中文
    /// 生产者当前可轮转使用的缓冲区数量（`min_buffers..=max_buffers`）。
    pub effective_capacity: usize,
    pub consecutive_stalls: u32,
    pub consecutive_idle: u32,
    /// ### English
    /// Set while a growth allocation runs outside the lock.
    ///
    /// ### 中文
    /// 在锁外执行扩容分配期间置位。
    pub growing: bool,
}

pub(super) struct QueueState {
    /// ### English
    /// Properties new allocations use (changes on resize).
    ///
    /// ### 中文
    /// 新分配使用的属性（resize 时改变）。
    pub properties: BufferProperties,
    /// ### English
    /// Every allocated buffer, keyed by id.
    ///
    /// ### 中文
    /// 所有已分配的缓冲区，按 id 索引。
    pub buffers: BTreeMap<BufferId, Buffer>,
    pub free: VecDeque<BufferId>,
    pub in_flight: Option<BufferId>,
    /// ### English
    /// Submitted buffers, oldest first (ascending `seq`).
    ///
    /// ### 中文
    /// 已提交的缓冲区，最旧的在前（`seq` 递增）。
    pub ready: VecDeque<ReadyEntry>,
    pub consumer_owned: Vec<BufferId>,
    /// ### English
    /// Replacement buffers allocated by a resize, waiting for stale buffers to come back.
    ///
    /// ### 中文
    /// resize 分配的替换缓冲区，等待旧尺寸缓冲区归还后进行替换。
    pub replacements: Vec<Buffer>,
    pub next_seq: u64,
    pub closed: bool,
    pub scaling: ScalingState,
    pub stats: QueueStats,
}

/// ### English
/// Where a buffer re-enters the free list.
///
/// ### 中文
/// 缓冲区重新进入空闲列表的位置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum FreeSlot {
    /// ### English
    /// Never displayed (dropped frames, fresh allocations): handed out first.
    ///
    /// ### 中文
    /// 从未显示过（被丢弃的帧、新分配的缓冲区）：最先分配出去。
    Front,
    /// ### English
    /// Just left scanout: handed out last, so a repost can still pick it up.
    ///
    /// ### 中文
    /// 刚结束扫描输出：最后才分配出去，以便重新 post 时仍可取回。
    Back,
}

impl QueueState {
    pub fn new(properties: BufferProperties, buffers: Vec<Buffer>, effective_capacity: usize) -> Self {
        let free = buffers.iter().map(Buffer::id).collect();
        let buffers = buffers.into_iter().map(|buffer| (buffer.id(), buffer)).collect();
        Self {
            properties,
            buffers,
            free,
            in_flight: None,
            ready: VecDeque::new(),
            consumer_owned: Vec::new(),
            replacements: Vec::new(),
            next_seq: 1,
            closed: false,
            scaling: ScalingState {
                effective_capacity,
                consecutive_stalls: 0,
                consecutive_idle: 0,
                growing: false,
            },
            stats: QueueStats::default(),
        }
    }

    #[inline]
    pub fn allocated(&self) -> usize {
        self.buffers.len()
    }

    /// ### English
    /// Allocated buffers beyond the effective capacity; they stay in the pool but are not
    /// available to the producer.
    ///
    /// ### 中文
    /// 超出有效容量的已分配缓冲区；它们留在池中，但生产者不可使用。
    #[inline]
    pub fn parked(&self) -> usize {
        self.allocated()
            .saturating_sub(self.scaling.effective_capacity)
    }

    /// ### English
    /// Free buffers the producer needs to see before it may take one.
    ///
    /// `min_free_for_acquire` keeps the last shown buffer out of the producer's hands. A buffer
    /// the consumer still holds for scanout already meets that reservation, so it counts toward
    /// it whether the platform releases immediately or on a completion fence. At least one free
    /// buffer beyond the parked ones is always required.
    ///
    /// ### 中文
    /// 生产者获取缓冲区之前需要的空闲缓冲区数量。
    ///
    /// `min_free_for_acquire` 用于让最近显示的缓冲区不落入生产者手中。消费者仍为扫描输出而
    /// 持有的缓冲区已经满足这一保留，因此无论平台是立即释放还是通过完成 fence 释放，都计入
    /// 该数量。除停放的缓冲区外，始终至少需要一个空闲缓冲区。
    #[inline]
    pub fn acquire_threshold(&self, min_free_for_acquire: usize) -> usize {
        let scanout = self.consumer_owned.len().min(1);
        min_free_for_acquire.saturating_sub(scanout).max(1) + self.parked()
    }

    #[inline]
    pub fn producer_can_acquire(&self, min_free_for_acquire: usize) -> bool {
        self.free.len() >= self.acquire_threshold(min_free_for_acquire)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    /// ### English
    /// Returns `id` to the free list, swapping it for a resize replacement if its size is stale.
    ///
    /// A stale buffer without a replacement left is dropped from the pool; the scaling logic
    /// re-allocates at the new size if the capacity still needs it.
    ///
    /// #### Parameters
    /// - `id`: Buffer leaving its previous set.
    /// - `slot`: Which end of the free list it goes to.
    ///
    /// ### 中文
    /// 将 `id` 放回空闲列表；若其尺寸已过期，则替换为 resize 的替换缓冲区。
    ///
    /// 没有剩余替换缓冲区的过期缓冲区会从池中移除；若容量仍需要，伸缩逻辑会按新尺寸重新分配。
    ///
    /// #### 参数
    /// - `id`：离开原集合的缓冲区。
    /// - `slot`：放入空闲列表的哪一端。
    pub fn push_free(&mut self, id: BufferId, slot: FreeSlot) {
        let id = match self.buffers.get(&id) {
            Some(buffer) if buffer.properties() != self.properties => {
                self.buffers.remove(&id);
                match self.replacements.pop() {
                    Some(replacement) => {
                        let new_id = replacement.id();
                        log::trace!("buffer {id} replaced by {new_id} after resize");
                        self.buffers.insert(new_id, replacement);
                        new_id
                    }
                    None => {
                        log::debug!("buffer {id} retired after resize");
                        return;
                    }
                }
            }
            _ => id,
        };

        match slot {
            FreeSlot::Front => self.free.push_front(id),
            FreeSlot::Back => self.free.push_back(id),
        }
    }

    /// ### English
    /// Validates that `buffer` is the producer's current buffer.
    ///
    /// ### 中文
    /// 校验 `buffer` 是生产者当前持有的缓冲区。
    pub fn check_producer_owned(&self, id: BufferId) -> Result<(), ContractViolation> {
        match self.in_flight {
            Some(current) if current == id => Ok(()),
            _ if !self.buffers.contains_key(&id) => Err(ContractViolation::UnknownBuffer { buffer: id }),
            Some(current) => Err(ContractViolation::NotCurrentBuffer {
                expected: current,
                got: id,
            }),
            None => Err(ContractViolation::NotProducerOwned { buffer: id }),
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            free: self.free.iter().copied().collect(),
            in_flight: self.in_flight,
            ready: self.ready.iter().map(|entry| entry.id).collect(),
            consumer_owned: self.consumer_owned.clone(),
            allocated: self.buffers.keys().copied().collect(),
            effective_capacity: self.scaling.effective_capacity,
            closed: self.closed,
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.scaling.effective_capacity,
            allocated: self.allocated(),
            ..self.stats
        }
    }

    /// ### English
    /// Checks set disjointness and pool accounting. Compiled to nothing in release builds.
    ///
    /// ### 中文
    /// 检查集合互不相交以及缓冲池计数。release 构建中不产生任何代码。
    #[inline]
    pub fn assert_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            let mut seen: Vec<BufferId> = self
                .free
                .iter()
                .copied()
                .chain(self.in_flight)
                .chain(self.ready.iter().map(|entry| entry.id))
                .chain(self.consumer_owned.iter().copied())
                .collect();
            let members = seen.len();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), members, "buffer appears in more than one set");
            assert!(
                seen.iter().copied().eq(self.buffers.keys().copied()),
                "buffer sets do not cover the pool exactly: sets {seen:?}, pool {:?}",
                self.buffers.keys().collect::<Vec<_>>()
            );
            assert!(
                self.ready
                    .iter()
                    .zip(self.ready.iter().skip(1))
                    .all(|(a, b)| a.seq < b.seq),
                "ready buffers out of submission order"
            );
        }
    }
}
