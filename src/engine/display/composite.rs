use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::engine::buffer::BufferId;
use crate::engine::config::CompositorConfig;
use crate::engine::error::DisplayError;
use crate::engine::frame::FrameClock;
use crate::engine::platform::PostPrimitive;
use crate::engine::queue::BufferQueue;

use super::{DisplayConfiguration, DisplayReport, DisplaySyncGroup, OutputId};

/// ### English
/// One freshly posted frame.
///
/// ### 中文
/// 一帧新 post 的画面。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostedFrame {
    pub output: OutputId,
    pub buffer: BufferId,
    pub seq: u64,
    /// ### English
    /// Frames between submission and display: clock value after this post minus the clock value
    /// observed at submit.
    ///
    /// ### 中文
    /// 从提交到显示经过的帧数：本次 post 之后的时钟值减去提交时观察到的时钟值。
    pub latency: u64,
}

/// ### English
/// Result of one `Display::composite` tick.
///
/// ### 中文
/// 一次 `Display::composite` tick 的结果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeOutcome {
    /// ### English
    /// Frame clock value after the tick.
    ///
    /// ### 中文
    /// tick 之后的帧时钟值。
    pub frame: u64,
    pub posted: Vec<PostedFrame>,
    /// ### English
    /// Outputs that showed their previous buffer again.
    ///
    /// ### 中文
    /// 再次显示上一帧缓冲区的输出。
    pub reposted: Vec<(OutputId, BufferId)>,
    /// ### English
    /// Outputs with nothing to show (no queue, nothing posted yet, or not in use).
    ///
    /// ### 中文
    /// 没有内容可显示的输出（无队列、尚未 post 过或未使用）。
    pub skipped: Vec<OutputId>,
    /// ### English
    /// Outputs belonging to failed sync groups.
    ///
    /// ### 中文
    /// 属于失败同步组的输出。
    pub failed: Vec<OutputId>,
}

/// ### English
/// The consumer side of the compositor: outputs, their sync groups and the shared frame clock.
///
/// The configuration is behind its own `RwLock`; sync groups behind a `Mutex` taken for each
/// tick and for attach/detach.
///
/// ### 中文
/// 合成器的消费者侧：输出、输出的同步组以及共享帧时钟。
///
/// 配置由独立的 `RwLock` 保护；同步组由 `Mutex` 保护，每次 tick 以及 attach/detach 时加锁。
pub struct Display {
    configuration: RwLock<DisplayConfiguration>,
    groups: Mutex<Vec<DisplaySyncGroup>>,
    clock: Arc<FrameClock>,
    report: Arc<dyn DisplayReport>,
    post: Arc<dyn PostPrimitive>,
    paused: AtomicBool,
}

impl Display {
    /// ### English
    /// Creates a display over `configuration`.
    ///
    /// #### Parameters
    /// - `configuration`: Initial output configuration (must be valid).
    /// - `group_outputs`: Post all outputs as one sync group instead of one group per output.
    /// - `post`: Platform post primitive.
    /// - `clock`: Shared frame clock (also handed to every surface queue).
    /// - `report`: Observability sink.
    ///
    /// ### 中文
    /// 基于 `configuration` 创建显示端。
    ///
    /// #### 参数
    /// - `configuration`：初始输出配置（必须有效）。
    /// - `group_outputs`：将所有输出作为一个同步组 post，而不是每个输出一组。
    /// - `post`：平台 post 原语。
    /// - `clock`：共享帧时钟（同时交给每个 surface 队列）。
    /// - `report`：可观测性接收端。
    pub fn new(
        configuration: DisplayConfiguration,
        group_outputs: bool,
        post: Arc<dyn PostPrimitive>,
        clock: Arc<FrameClock>,
        report: Arc<dyn DisplayReport>,
    ) -> Result<Self, DisplayError> {
        if !configuration.valid() {
            return Err(DisplayError::InvalidConfiguration(
                "initial display configuration is invalid".to_string(),
            ));
        }

        let ids: Vec<OutputId> = configuration.outputs.iter().map(|output| output.id).collect();
        let groups = if group_outputs {
            vec![DisplaySyncGroup::new(ids)]
        } else {
            ids.into_iter()
                .map(|id| DisplaySyncGroup::new([id]))
                .collect()
        };

        log::info!(
            "display created: {} outputs in {} sync groups",
            configuration.outputs.len(),
            groups.len()
        );
        report.report_successful_display_construction();
        report.report_configuration(&configuration);

        Ok(Self {
            configuration: RwLock::new(configuration),
            groups: Mutex::new(groups),
            clock,
            report,
            post,
            paused: AtomicBool::new(false),
        })
    }

    pub fn from_config(
        config: &CompositorConfig,
        post: Arc<dyn PostPrimitive>,
        clock: Arc<FrameClock>,
        report: Arc<dyn DisplayReport>,
    ) -> Result<Self, DisplayError> {
        Self::new(
            DisplayConfiguration::from_outputs(&config.outputs),
            config.group_outputs,
            post,
            clock,
            report,
        )
    }

    pub fn configuration(&self) -> DisplayConfiguration {
        self.configuration.read().clone()
    }

    /// ### English
    /// Applies a new configuration. Invalid configurations, or ones adding/removing outputs, are
    /// rejected and leave the current configuration in place.
    ///
    /// ### 中文
    /// 应用新的配置。无效的配置、或增删输出的配置会被拒绝，并保留当前配置。
    pub fn configure(&self, configuration: &DisplayConfiguration) -> Result<(), DisplayError> {
        if !configuration.valid() {
            log::warn!("rejected invalid display configuration");
            return Err(DisplayError::InvalidConfiguration(
                "configuration is invalid or inconsistent".to_string(),
            ));
        }

        {
            let mut current = self.configuration.write();
            if let Some(unknown) = configuration
                .outputs
                .iter()
                .find(|output| current.output(output.id).is_none())
            {
                return Err(DisplayError::UnknownOutput(unknown.id));
            }
            if configuration.outputs.len() != current.outputs.len() {
                return Err(DisplayError::InvalidConfiguration(
                    "configuration must describe every output".to_string(),
                ));
            }
            *current = configuration.clone();
        }

        log::info!("display configuration changed");
        self.report.report_configuration(configuration);
        Ok(())
    }

    pub fn for_each_display_sync_group(&self, mut f: impl FnMut(&DisplaySyncGroup)) {
        self.groups.lock().iter().for_each(|group| f(group));
    }

    /// ### English
    /// Makes `queue` the content source for `output`. Returns the previously attached queue.
    ///
    /// ### 中文
    /// 将 `queue` 设为 `output` 的内容来源。返回之前绑定的队列。
    pub fn attach(
        &self,
        output: OutputId,
        queue: Arc<BufferQueue>,
    ) -> Result<Option<Arc<BufferQueue>>, DisplayError> {
        let mut groups = self.groups.lock();
        let buffer = groups
            .iter_mut()
            .find_map(|group| group.display_buffer_mut(output))
            .ok_or(DisplayError::UnknownOutput(output))?;
        log::debug!("queue attached to output {output}");
        Ok(buffer.attach(queue))
    }

    pub fn detach(&self, output: OutputId) -> Result<Option<Arc<BufferQueue>>, DisplayError> {
        let mut groups = self.groups.lock();
        let buffer = groups
            .iter_mut()
            .find_map(|group| group.display_buffer_mut(output))
            .ok_or(DisplayError::UnknownOutput(output))?;
        Ok(buffer.detach())
    }

    /// ### English
    /// Stops posting; `composite` returns `DisplayError::Paused` until `resume`.
    ///
    /// ### 中文
    /// 停止 post；在 `resume` 之前 `composite` 返回 `DisplayError::Paused`。
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            log::info!("display paused");
        }
    }

    /// ### English
    /// Resumes posting and clears every sync-group failure.
    ///
    /// ### 中文
    /// 恢复 post，并清除所有同步组的失败状态。
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.groups
            .lock()
            .iter_mut()
            .for_each(DisplaySyncGroup::clear_failure);
        log::info!("display resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn clock(&self) -> &Arc<FrameClock> {
        &self.clock
    }

    pub fn last_frame(&self) -> u64 {
        self.clock.load()
    }

    /// ### English
    /// Last frame posted on `output`. All outputs share one clock.
    ///
    /// ### 中文
    /// `output` 上最近 post 的帧。所有输出共享同一个时钟。
    pub fn last_frame_on(&self, output: OutputId) -> Result<u64, DisplayError> {
        if self.configuration.read().output(output).is_none() {
            return Err(DisplayError::UnknownOutput(output));
        }
        Ok(self.clock.load())
    }

    /// ### English
    /// One consumer tick over every sync group.
    ///
    /// ### 中文
    /// 对所有同步组执行一次消费者 tick。
    pub fn composite(&self) -> Result<CompositeOutcome, DisplayError> {
        if self.is_paused() {
            return Err(DisplayError::Paused);
        }

        let configuration = self.configuration.read().clone();
        let mut outcome = CompositeOutcome::default();
        let mut groups = self.groups.lock();
        for group in groups.iter_mut() {
            group.post_frame(
                &configuration,
                self.post.as_ref(),
                &self.clock,
                self.report.as_ref(),
                &mut outcome,
            );
        }
        drop(groups);

        outcome.frame = self.clock.load();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::engine::buffer::Buffer;
    use crate::engine::config::{DisplayOutputConfig, QueueConfig};
    use crate::engine::error::PostError;
    use crate::engine::platform::{CompletionSignal, HeadlessCompletion, HeadlessPlatform};
    use crate::engine::queue::BufferQueueInit;
    use crate::engine::queue::test_support::{properties, queue_with};

    #[derive(Default)]
    struct RecordingReport {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReport {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl DisplayReport for RecordingReport {
        fn report_successful_display_construction(&self) {
            self.events.lock().push("constructed".to_string());
        }

        fn report_configuration(&self, configuration: &DisplayConfiguration) {
            self.events
                .lock()
                .push(format!("configuration {}", configuration.outputs.len()));
        }

        fn report_vsync(&self, output: OutputId, frame: u64) {
            self.events.lock().push(format!("vsync {output} {frame}"));
        }

        fn report_post_failed(&self, output: OutputId, _error: &PostError) {
            self.events.lock().push(format!("post failed {output}"));
        }
    }

    struct RejectingPost;

    impl PostPrimitive for RejectingPost {
        fn post(&self, _output: OutputId, _buffer: &Buffer) -> Result<CompletionSignal, PostError> {
            Err(PostError::Rejected("mode not supported".to_string()))
        }
    }

    fn display_with(
        outputs: usize,
        post: Arc<dyn PostPrimitive>,
        clock: Arc<FrameClock>,
    ) -> (Display, Arc<RecordingReport>) {
        let report = Arc::new(RecordingReport::default());
        let configuration =
            DisplayConfiguration::from_outputs(&vec![DisplayOutputConfig::default(); outputs]);
        let display = Display::new(configuration, false, post, clock, report.clone()).unwrap();
        (display, report)
    }

    fn produce(queue: &BufferQueue) -> BufferId {
        let buffer = queue.acquire_for_producer().unwrap();
        queue.submit_from_producer(&buffer).unwrap();
        buffer.id()
    }

    #[test]
    fn construction_is_reported() {
        let platform = Arc::new(HeadlessPlatform::new());
        let (_display, report) = display_with(1, platform, Arc::new(FrameClock::new()));
        assert_eq!(report.events(), vec!["constructed", "configuration 1"]);
    }

    #[test]
    fn posts_newest_frame_and_reposts_when_idle() {
        let (queue, platform, clock) = queue_with(QueueConfig::fixed(3));
        let (display, report) = display_with(2, platform.clone(), clock);
        display.attach(OutputId(1), queue.clone()).unwrap();

        produce(&queue);
        let newest = produce(&queue);

        let outcome = display.composite().unwrap();
        assert_eq!(outcome.frame, 1);
        assert_eq!(outcome.posted.len(), 1);
        assert_eq!(outcome.posted[0].buffer, newest);
        assert_eq!(outcome.posted[0].seq, 2);
        assert_eq!(outcome.posted[0].latency, 1);
        assert_eq!(outcome.skipped, vec![OutputId(2)]);
        assert_eq!(queue.stats().dropped, 1);
        assert_eq!(platform.on_screen(OutputId(1)), Some(newest));

        let outcome = display.composite().unwrap();
        assert!(outcome.posted.is_empty());
        assert_eq!(outcome.reposted, vec![(OutputId(1), newest)]);
        assert_eq!(outcome.frame, 2);
        assert!(report.events().contains(&"vsync 1 2".to_string()));
        assert!(queue.snapshot().consumer_owned.is_empty());
    }

    #[test]
    fn fence_completion_holds_buffers_until_the_next_flip() {
        let platform = Arc::new(HeadlessPlatform::with_completion(HeadlessCompletion::NextPost));
        let clock = Arc::new(FrameClock::new());
        let queue = BufferQueue::new(BufferQueueInit {
            properties: properties(),
            config: QueueConfig::fixed(3),
            allocator: platform.clone(),
            clock: clock.clone(),
            flags: Default::default(),
        })
        .unwrap();
        let (display, _report) = display_with(1, platform, clock);
        display.attach(OutputId(1), queue.clone()).unwrap();

        let first = produce(&queue);
        display.composite().unwrap();
        assert_eq!(queue.snapshot().consumer_owned, vec![first]);

        let second = produce(&queue);
        display.composite().unwrap();
        assert_eq!(queue.snapshot().consumer_owned, vec![second]);
        assert!(queue.snapshot().free.contains(&first));

        let mut pending = Vec::new();
        display.for_each_display_sync_group(|group| {
            group.for_each_display_buffer(|buffer| {
                pending.push((buffer.last_posted(), buffer.pending_releases()))
            })
        });
        assert_eq!(pending, vec![(Some(second), 1)]);

        display.detach(OutputId(1)).unwrap();
        assert!(queue.snapshot().consumer_owned.is_empty());
    }

    #[test]
    fn post_failure_marks_the_group_failed_until_resume() {
        let (queue, _platform, clock) = queue_with(QueueConfig::fixed(3));
        let (display, report) = display_with(1, Arc::new(RejectingPost), clock.clone());
        display.attach(OutputId(1), queue.clone()).unwrap();

        produce(&queue);
        let outcome = display.composite().unwrap();
        assert_eq!(outcome.failed, vec![OutputId(1)]);
        assert_eq!(clock.load(), 0);
        assert!(report.events().contains(&"post failed 1".to_string()));
        assert!(queue.snapshot().consumer_owned.is_empty());

        produce(&queue);
        let outcome = display.composite().unwrap();
        assert_eq!(outcome.failed, vec![OutputId(1)]);
        assert_eq!(queue.snapshot().ready.len(), 1);

        display.resume();
        let mut failed = Vec::new();
        display.for_each_display_sync_group(|group| failed.push(group.is_failed()));
        assert_eq!(failed, vec![false]);
    }

    struct RejectOutput {
        rejected: OutputId,
        inner: Arc<HeadlessPlatform>,
    }

    impl PostPrimitive for RejectOutput {
        fn post(&self, output: OutputId, buffer: &Buffer) -> Result<CompletionSignal, PostError> {
            if output == self.rejected {
                return Err(PostError::Rejected("output unplugged".to_string()));
            }
            self.inner.post(output, buffer)
        }
    }

    #[test]
    fn grouped_failure_still_accounts_outputs_already_shown() {
        let platform = Arc::new(HeadlessPlatform::new());
        let clock = Arc::new(FrameClock::new());
        let queue_for = |platform: &Arc<HeadlessPlatform>| {
            BufferQueue::new(BufferQueueInit {
                properties: properties(),
                config: QueueConfig::fixed(3),
                allocator: platform.clone(),
                clock: clock.clone(),
                flags: Default::default(),
            })
            .unwrap()
        };
        let first_queue = queue_for(&platform);
        let second_queue = queue_for(&platform);

        let report = Arc::new(RecordingReport::default());
        let configuration =
            DisplayConfiguration::from_outputs(&vec![DisplayOutputConfig::default(); 2]);
        let post = Arc::new(RejectOutput {
            rejected: OutputId(2),
            inner: platform.clone(),
        });
        let display =
            Display::new(configuration, true, post, clock.clone(), report.clone()).unwrap();
        display.attach(OutputId(1), first_queue.clone()).unwrap();
        display.attach(OutputId(2), second_queue.clone()).unwrap();

        let shown = produce(&first_queue);
        produce(&second_queue);

        let outcome = display.composite().unwrap();
        assert_eq!(outcome.posted.len(), 1);
        assert_eq!(outcome.posted[0].output, OutputId(1));
        assert_eq!(outcome.posted[0].buffer, shown);
        assert_eq!(outcome.posted[0].latency, 1);
        assert_eq!(outcome.failed, vec![OutputId(1), OutputId(2)]);
        assert_eq!(clock.load(), 1);
        assert_eq!(platform.on_screen(OutputId(1)), Some(shown));

        let events = report.events();
        assert!(events.contains(&"vsync 1 1".to_string()));
        assert!(events.contains(&"post failed 2".to_string()));
        assert!(!events.iter().any(|event| event.starts_with("vsync 2")));
    }

    #[test]
    fn paused_display_does_not_composite() {
        let platform = Arc::new(HeadlessPlatform::new());
        let (display, _report) = display_with(1, platform, Arc::new(FrameClock::new()));
        display.pause();
        assert!(display.is_paused());
        assert!(matches!(display.composite(), Err(DisplayError::Paused)));
        display.resume();
        assert!(display.composite().is_ok());
    }

    #[test]
    fn configure_rejects_unknown_outputs_and_skips_unused_ones() {
        let (queue, platform, clock) = queue_with(QueueConfig::fixed(3));
        let (display, report) = display_with(2, platform, clock);
        display.attach(OutputId(2), queue.clone()).unwrap();

        let mut unknown = display.configuration();
        unknown.outputs[1].id = OutputId(9);
        assert!(matches!(
            display.configure(&unknown),
            Err(DisplayError::UnknownOutput(OutputId(9)))
        ));

        let mut configuration = display.configuration();
        configuration.outputs[1].used = false;
        display.configure(&configuration).unwrap();
        assert_eq!(report.events().last().unwrap(), "configuration 2");

        produce(&queue);
        let outcome = display.composite().unwrap();
        assert!(outcome.posted.is_empty());
        assert_eq!(outcome.skipped, vec![OutputId(1), OutputId(2)]);
        assert_eq!(display.last_frame_on(OutputId(2)).unwrap(), 0);
        assert!(display.last_frame_on(OutputId(3)).is_err());
    }

    #[test]
    fn closed_queue_is_detached_automatically() {
        let (queue, platform, clock) = queue_with(QueueConfig::fixed(2));
        let (display, _report) = display_with(1, platform, clock);
        display.attach(OutputId(1), queue.clone()).unwrap();
        queue.close();

        let outcome = display.composite().unwrap();
        assert_eq!(outcome.skipped, vec![OutputId(1)]);
        assert!(display.detach(OutputId(1)).unwrap().is_none());
    }
}
