//! ### English
//! Sync groups: outputs that are posted together once per tick and fail together.
//!
//! ### 中文
//! 同步组：每个 tick 一起 post、一起失败的输出集合。

use crate::engine::frame::FrameClock;
use crate::engine::platform::PostPrimitive;

use super::buffer::Posted;
use super::{
    CompositeOutcome, DisplayBuffer, DisplayConfiguration, DisplayReport, OutputId, PostedFrame,
};

/// ### English
/// Outputs posted together as one unit per tick.
///
/// A post failure on any member marks the whole group failed; it stays silent until
/// `Display::resume` clears the failure.
///
/// ### 中文
/// 每个 tick 作为一个整体一起 post 的输出集合。
///
/// 任一成员 post 失败都会将整个组标记为失败；在 `Display::resume` 清除失败之前该组不再 post。
pub struct DisplaySyncGroup {
    buffers: Vec<DisplayBuffer>,
    failed: bool,
}

impl DisplaySyncGroup {
    pub(super) fn new(outputs: impl IntoIterator<Item = OutputId>) -> Self {
        Self {
            buffers: outputs.into_iter().map(DisplayBuffer::new).collect(),
            failed: false,
        }
    }

    pub fn outputs(&self) -> Vec<OutputId> {
        self.buffers.iter().map(DisplayBuffer::output).collect()
    }

    pub fn contains(&self, output: OutputId) -> bool {
        self.buffers.iter().any(|buffer| buffer.output() == output)
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn for_each_display_buffer(&self, mut f: impl FnMut(&DisplayBuffer)) {
        self.buffers.iter().for_each(|buffer| f(buffer));
    }

    pub(super) fn display_buffer_mut(&mut self, output: OutputId) -> Option<&mut DisplayBuffer> {
        self.buffers.iter_mut().find(|buffer| buffer.output() == output)
    }

    pub(super) fn clear_failure(&mut self) {
        self.failed = false;
    }

    /// ### English
    /// Runs one tick for the group and appends the results to `outcome`.
    ///
    /// Each display buffer posts its newest ready buffer (or reposts its last one). If anything
    /// was posted, the frame clock advances once for the group and every posted output gets a
    /// vsync report. A post failure stops the pass and fails the group; outputs already posted
    /// in this pass keep their vsync report and outcome entry.
    ///
    /// #### Parameters
    /// - `configuration`: Current display configuration (outputs not in use are skipped).
    /// - `post`: Platform post primitive.
    /// - `clock`: Shared frame clock.
    /// - `report`: Observability sink.
    /// - `outcome`: Accumulates posted/reposted/skipped outputs.
    ///
    /// ### 中文
    /// 为该组执行一次 tick，并将结果追加到 `outcome`。
    ///
    /// 每个 display buffer post 其最新的就绪缓冲区（或重发上一个）。若有任何 post 发生，
    /// 帧时钟为该组前进一次，并为每个已 post 的输出报告 vsync。post 失败会中止本轮并使该组
    /// 失败；本轮中已 post 的输出仍保留其 vsync 报告与结果条目。
    ///
    /// #### 参数
    /// - `configuration`：当前显示配置（未使用的输出会被跳过）。
    /// - `post`：平台 post 原语。
    /// - `clock`：共享帧时钟。
    /// - `report`：可观测性接收端。
    /// - `outcome`：累积已 post / 重发 / 跳过的输出。
    pub(super) fn post_frame(
        &mut self,
        configuration: &DisplayConfiguration,
        post: &dyn PostPrimitive,
        clock: &FrameClock,
        report: &dyn DisplayReport,
        outcome: &mut CompositeOutcome,
    ) {
        if self.failed {
            outcome.failed.extend(self.outputs());
            return;
        }

        let mut posted = Vec::with_capacity(self.buffers.len());
        let mut failure = None;
        for buffer in &mut self.buffers {
            let output = buffer.output();
            let in_use = configuration
                .output(output)
                .is_some_and(|record| record.used && record.connected);
            if !in_use {
                outcome.skipped.push(output);
                continue;
            }

            match buffer.post(post) {
                Ok(Some(result)) => posted.push((output, result)),
                Ok(None) => outcome.skipped.push(output),
                Err(err) => {
                    failure = Some((output, err));
                    break;
                }
            }
        }

        // Outputs posted before a failure were shown; they are still accounted for.
        if !posted.is_empty() {
            let frame = clock.increment_and_load();
            for (output, result) in posted {
                report.report_vsync(output, frame);
                match result {
                    Posted::Fresh {
                        buffer,
                        seq,
                        submitted_frame,
                    } => outcome.posted.push(PostedFrame {
                        output,
                        buffer,
                        seq,
                        latency: frame.saturating_sub(submitted_frame),
                    }),
                    Posted::Repost { buffer } => outcome.reposted.push((output, buffer)),
                }
            }
        }

        if let Some((output, err)) = failure {
            log::warn!("sync group failed: post on output {output} returned {err}");
            report.report_post_failed(output, &err);
            self.failed = true;
            outcome.failed.extend(self.outputs());
        }
    }
}
