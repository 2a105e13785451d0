use std::collections::HashSet;

use dpi::{PhysicalPosition, PhysicalSize};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::PixelFormat;
use crate::engine::config::DisplayOutputConfig;

use super::{Orientation, OutputId};

/// ### English
/// One video mode of an output.
///
/// ### 中文
/// 输出的一种视频模式。
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayMode {
    pub size: PhysicalSize<u32>,
    pub refresh_hz: f64,
}

/// ### English
/// Axis-aligned rectangle in the compositor's logical coordinate space.
///
/// ### 中文
/// 合成器逻辑坐标空间中的轴对齐矩形。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub top_left: PhysicalPosition<i32>,
    pub size: PhysicalSize<u32>,
}

/// ### English
/// Per-output configuration record.
///
/// ### 中文
/// 单个输出的配置记录。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfigurationOutput {
    pub id: OutputId,
    pub pixel_formats: Vec<PixelFormat>,
    pub current_format: PixelFormat,
    pub modes: Vec<DisplayMode>,
    /// ### English
    /// Index into `modes`.
    ///
    /// ### 中文
    /// `modes` 中的索引。
    pub current_mode: usize,
    pub physical_size_mm: PhysicalSize<u32>,
    pub connected: bool,
    /// ### English
    /// Whether the compositor draws to this output.
    ///
    /// ### 中文
    /// 合成器是否向该输出绘制。
    pub used: bool,
    pub top_left: PhysicalPosition<i32>,
    pub orientation: Orientation,
    pub scale: f32,
}

impl DisplayConfigurationOutput {
    pub fn mode(&self) -> Option<&DisplayMode> {
        self.modes.get(self.current_mode)
    }

    /// ### English
    /// Logical area covered by the output: the current mode size, rotated by the orientation and
    /// divided by the scale. Empty when the output is not in use.
    ///
    /// ### 中文
    /// 输出覆盖的逻辑区域：当前模式尺寸按方向旋转后再除以缩放。输出未使用时为空。
    pub fn extents(&self) -> Rectangle {
        let Some(mode) = self.mode().filter(|_| self.used && self.connected) else {
            return Rectangle {
                top_left: self.top_left,
                size: PhysicalSize::new(0, 0),
            };
        };

        let size = if self.orientation.is_sideways() {
            PhysicalSize::new(mode.size.height, mode.size.width)
        } else {
            mode.size
        };
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        Rectangle {
            top_left: self.top_left,
            size: PhysicalSize::new(
                (size.width as f32 / scale).round() as u32,
                (size.height as f32 / scale).round() as u32,
            ),
        }
    }

    pub fn valid(&self) -> bool {
        if !self.connected {
            return !self.used;
        }
        self.mode().is_some_and(|mode| {
            mode.size.width > 0 && mode.size.height > 0 && mode.refresh_hz > 0.0
        }) && self.pixel_formats.contains(&self.current_format)
            && self.scale.is_finite()
            && self.scale > 0.0
    }
}

/// ### English
/// The full set of outputs known to the display.
///
/// ### 中文
/// 显示端已知的全部输出。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfiguration {
    pub outputs: Vec<DisplayConfigurationOutput>,
}

impl DisplayConfiguration {
    /// ### English
    /// Builds a configuration from static output descriptions. Output ids start at 1 and outputs
    /// are laid out left to right.
    ///
    /// ### 中文
    /// 由静态输出描述构建配置。输出 id 从 1 开始，输出从左到右排列。
    pub fn from_outputs(outputs: &[DisplayOutputConfig]) -> Self {
        let mut x = 0i32;
        let outputs = outputs
            .iter()
            .zip(1u32..)
            .map(|(output, id)| {
                let top_left = PhysicalPosition::new(x, 0);
                let mut formats = vec![output.pixel_format];
                if output.pixel_format != PixelFormat::Xrgb8888 {
                    formats.push(PixelFormat::Xrgb8888);
                }
                let record = DisplayConfigurationOutput {
                    id: OutputId(id),
                    pixel_formats: formats,
                    current_format: output.pixel_format,
                    modes: vec![DisplayMode {
                        size: output.size,
                        refresh_hz: output.refresh_hz,
                    }],
                    current_mode: 0,
                    physical_size_mm: output.physical_size_mm,
                    connected: true,
                    used: true,
                    top_left,
                    orientation: output.orientation,
                    scale: output.scale,
                };
                x = x.saturating_add(record.extents().size.width as i32);
                record
            })
            .collect();
        Self { outputs }
    }

    pub fn for_each_output(&self, mut f: impl FnMut(&DisplayConfigurationOutput)) {
        self.outputs.iter().for_each(|output| f(output));
    }

    pub fn output(&self, id: OutputId) -> Option<&DisplayConfigurationOutput> {
        self.outputs.iter().find(|output| output.id == id)
    }

    /// ### English
    /// Every output is valid, ids are unique and at least one output is in use.
    ///
    /// ### 中文
    /// 每个输出均有效、id 唯一，且至少有一个输出处于使用中。
    pub fn valid(&self) -> bool {
        let mut ids = HashSet::new();
        self.outputs.iter().all(|output| output.valid() && ids.insert(output.id))
            && self.outputs.iter().any(|output| output.used)
    }
}
