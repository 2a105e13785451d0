//! ### English
//! Consumer side of the compositor.
//!
//! A [`Display`] owns one [`DisplaySyncGroup`] per set of outputs that flip together. Every
//! output has a [`DisplayBuffer`] bound to at most one surface queue. On each tick the display
//! buffer takes the newest ready buffer (or reposts the last one), posts it through the
//! platform, and releases it back to the queue once the platform's completion signal fires.
//!
//! ### 中文
//! 合成器的消费者侧。
//!
//! [`Display`] 为每组需要同时翻转的输出持有一个 [`DisplaySyncGroup`]。每个输出都有一个
//! [`DisplayBuffer`]，最多绑定一个 surface 队列。每次 tick 中，display buffer 取出最新的
//! 就绪缓冲区（或重发上一个），通过平台 post，并在平台完成信号触发后将其归还给队列。

use std::fmt;

use serde::{Deserialize, Serialize};

mod buffer;
mod composite;
mod configuration;
mod report;
mod sync_group;

pub use buffer::DisplayBuffer;
pub use composite::{CompositeOutcome, Display, PostedFrame};
pub use configuration::{DisplayConfiguration, DisplayConfigurationOutput, DisplayMode, Rectangle};
pub use report::{DisplayReport, LoggingDisplayReport, NullDisplayReport};
pub use sync_group::DisplaySyncGroup;

/// ### English
/// Identifier of a physical output. Ids are assigned from 1 in configuration order.
///
/// ### 中文
/// 物理输出的标识。id 按配置顺序从 1 开始分配。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ### English
/// Rotation applied to an output's content.
///
/// ### 中文
/// 应用于输出内容的旋转方向。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Normal,
    Left,
    Inverted,
    Right,
}

impl Orientation {
    /// ### English
    /// Width and height swap for `Left` and `Right`.
    ///
    /// ### 中文
    /// `Left` 与 `Right` 会交换宽和高。
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}
