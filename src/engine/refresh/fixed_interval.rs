use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;

use crate::engine::display::Display;

/// ### English
/// Refresh driver that composites at a fixed interval (`target_fps != 0` path).
///
/// One named background thread waits on a `crossbeam_channel::tick` timer; dropping the driver
/// stops and joins it.
///
/// ### 中文
/// 以固定间隔合成的 refresh driver（`target_fps != 0` 路径）。
///
/// 一个具名后台线程等待 `crossbeam_channel::tick` 计时器；drop 驱动器时停止并 join 该线程。
pub struct FixedIntervalRefreshDriver {
    frame_duration: Duration,
    /// ### English
    /// Dropping (or sending on) this sender stops the thread.
    ///
    /// ### 中文
    /// drop 该发送端（或向其发送）会停止线程。
    stop_tx: Option<channel::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FixedIntervalRefreshDriver {
    /// ### English
    /// Starts the timer thread.
    ///
    /// #### Parameters
    /// - `display`: Display to composite on every tick.
    /// - `frame_duration`: Interval between ticks.
    ///
    /// ### 中文
    /// 启动计时线程。
    ///
    /// #### 参数
    /// - `display`：每次 tick 要合成的显示端。
    /// - `frame_duration`：tick 之间的间隔。
    pub fn new(display: Arc<Display>, frame_duration: Duration) -> Self {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("XianCompositorRefresh".to_string())
            .spawn(move || run_fixed_interval(display, frame_duration, stop_rx))
            .expect("failed to spawn refresh thread");

        log::debug!(
            "fixed-interval refresh started ({:.3}ms per frame)",
            frame_duration.as_secs_f64() * 1000.0
        );
        Self {
            frame_duration,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// ### English
    /// Stops the timer thread and joins it. Idempotent.
    ///
    /// ### 中文
    /// 停止计时线程并 join。幂等。
    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if let Some(stop_tx) = self.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            let _ = thread.join();
            log::debug!("fixed-interval refresh stopped");
        }
    }
}

impl Drop for FixedIntervalRefreshDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_fixed_interval(
    display: Arc<Display>,
    frame_duration: Duration,
    stop_rx: channel::Receiver<()>,
) {
    let ticker = channel::tick(frame_duration);
    loop {
        channel::select! {
            recv(ticker) -> _ => {
                super::composite_logged(&display);
            }
            recv(stop_rx) -> _ => return,
        }
    }
}
