use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::display::{CompositeOutcome, Display};

/// ### English
/// Refresh driver driven by an external vsync tick (host side).
///
/// ### 中文
/// 由外部 vsync tick（宿主侧）驱动的 refresh driver。
pub struct VsyncRefreshDriver {
    display: Arc<Display>,
    /// ### English
    /// Host ticks seen so far, including ticks skipped while paused.
    ///
    /// ### 中文
    /// 迄今收到的宿主 tick 数，包括暂停期间被跳过的 tick。
    ticks: AtomicU64,
}

impl VsyncRefreshDriver {
    pub fn new(display: Arc<Display>) -> Self {
        Self {
            display,
            ticks: AtomicU64::new(0),
        }
    }

    /// ### English
    /// Composites once. Returns `None` while the display is paused.
    ///
    /// ### 中文
    /// 合成一次。显示端暂停时返回 `None`。
    pub fn tick(&self) -> Option<CompositeOutcome> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        super::composite_logged(&self.display)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::CompositorConfig;
    use crate::engine::display::NullDisplayReport;
    use crate::engine::frame::FrameClock;
    use crate::engine::platform::HeadlessPlatform;

    #[test]
    fn each_tick_composites_unless_paused() {
        let display = Arc::new(
            Display::from_config(
                &CompositorConfig::default(),
                Arc::new(HeadlessPlatform::new()),
                Arc::new(FrameClock::new()),
                Arc::new(NullDisplayReport),
            )
            .unwrap(),
        );
        let driver = VsyncRefreshDriver::new(display.clone());

        assert!(driver.tick().is_some());
        display.pause();
        assert!(driver.tick().is_none());
        assert_eq!(driver.ticks(), 2);
    }
}
