//! ### English
//! Drivers for the consumer tick.
//!
//! The display does not run on its own clock: either the host calls `tick` once per vsync
//! (`target_fps == 0`), or a timer thread composites at a fixed rate.
//!
//! ### 中文
//! 消费者 tick 的驱动器。
//!
//! 显示端不自带时钟：要么由宿主在每次 vsync 时调用 `tick`（`target_fps == 0`），
//! 要么由计时线程以固定频率合成。
mod fixed_interval;
mod vsync_driver;

use std::sync::Arc;
use std::time::Duration;

use crate::engine::display::{CompositeOutcome, Display};

pub use fixed_interval::FixedIntervalRefreshDriver;
pub use vsync_driver::VsyncRefreshDriver;

/// ### English
/// The driver selected for a runtime.
///
/// ### 中文
/// 运行时所选用的驱动器。
pub enum RefreshDriver {
    Vsync(VsyncRefreshDriver),
    FixedInterval(FixedIntervalRefreshDriver),
}

impl RefreshDriver {
    /// ### English
    /// Picks the vsync driver for `target_fps == 0`, otherwise a fixed-interval driver.
    ///
    /// #### Parameters
    /// - `display`: Display to composite.
    /// - `target_fps`: Fixed tick rate (`0` means externally driven).
    ///
    /// ### 中文
    /// `target_fps == 0` 时选择 vsync 驱动器，否则选择固定间隔驱动器。
    ///
    /// #### 参数
    /// - `display`：要合成的显示端。
    /// - `target_fps`：固定 tick 频率（`0` 表示外部驱动）。
    pub fn for_target_fps(display: Arc<Display>, target_fps: u32) -> Self {
        if target_fps == 0 {
            Self::Vsync(VsyncRefreshDriver::new(display))
        } else {
            let frame_duration = Duration::from_secs_f64(1.0 / f64::from(target_fps));
            Self::FixedInterval(FixedIntervalRefreshDriver::new(display, frame_duration))
        }
    }

    /// ### English
    /// Host vsync tick. Only the vsync driver composites here; the fixed-interval driver ticks on
    /// its own thread and returns `None`.
    ///
    /// ### 中文
    /// 宿主 vsync tick。只有 vsync 驱动器会在此合成；固定间隔驱动器在自己的线程上 tick，
    /// 这里返回 `None`。
    pub fn tick(&self) -> Option<CompositeOutcome> {
        match self {
            Self::Vsync(driver) => driver.tick(),
            Self::FixedInterval(_) => None,
        }
    }

    pub fn stop(&mut self) {
        if let Self::FixedInterval(driver) = self {
            driver.stop();
        }
    }
}

/// ### English
/// Runs one composite and logs anything other than a successful tick.
///
/// ### 中文
/// 执行一次合成，并记录除成功 tick 以外的情况。
fn composite_logged(display: &Display) -> Option<CompositeOutcome> {
    match display.composite() {
        Ok(outcome) => {
            if !outcome.failed.is_empty() {
                log::trace!("tick {}: failed outputs {:?}", outcome.frame, outcome.failed);
            }
            Some(outcome)
        }
        Err(err) => {
            log::trace!("tick skipped: {err}");
            None
        }
    }
}
