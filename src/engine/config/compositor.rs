use std::path::Path;

use dpi::PhysicalSize;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::PixelFormat;
use crate::engine::display::Orientation;
use crate::engine::error::ConfigError;

use super::QueueConfig;

/// ### English
/// Environment variable overriding `CompositorConfig::target_fps`.
///
/// ### 中文
/// 覆盖 `CompositorConfig::target_fps` 的环境变量。
pub const TARGET_FPS_ENV: &str = "XIAN_COMPOSITOR_TARGET_FPS";

/// ### English
/// Static description of one physical output.
///
/// ### 中文
/// 单个物理输出的静态描述。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOutputConfig {
    pub size: PhysicalSize<u32>,
    pub physical_size_mm: PhysicalSize<u32>,
    pub refresh_hz: f64,
    pub scale: f32,
    pub orientation: Orientation,
    pub pixel_format: PixelFormat,
}

impl Default for DisplayOutputConfig {
    fn default() -> Self {
        Self {
            size: PhysicalSize::new(1920, 1080),
            physical_size_mm: PhysicalSize::new(0, 0),
            refresh_hz: 60.0,
            scale: 1.0,
            orientation: Orientation::Normal,
            pixel_format: PixelFormat::Argb8888,
        }
    }
}

/// ### English
/// Top-level compositor configuration.
///
/// ### 中文
/// 合成器的顶层配置。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub outputs: Vec<DisplayOutputConfig>,
    /// ### English
    /// If true, all outputs form one sync group; otherwise each output gets its own.
    ///
    /// ### 中文
    /// 为 true 时所有输出组成一个同步组；否则每个输出单独成组。
    pub group_outputs: bool,
    pub queue: QueueConfig,
    /// ### English
    /// Refresh rate of the internal timer driver. `0` means the host drives ticks (vsync mode).
    ///
    /// ### 中文
    /// 内部定时驱动的刷新率。`0` 表示由宿主驱动 tick（vsync 模式）。
    pub target_fps: u32,
    pub default_surface_size: PhysicalSize<u32>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            outputs: vec![DisplayOutputConfig::default()],
            group_outputs: false,
            queue: QueueConfig::default(),
            target_fps: 0,
            default_surface_size: PhysicalSize::new(1280, 720),
        }
    }
}

impl CompositorConfig {
    /// ### English
    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields take their defaults.
    ///
    /// ### 中文
    /// 解析并校验 JSON 配置文档。
    ///
    /// 缺失的字段使用默认值。
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// ### English
    /// Reads, parses and validates a JSON configuration file.
    ///
    /// #### Parameters
    /// - `path`: Path to the JSON file.
    ///
    /// ### 中文
    /// 读取、解析并校验 JSON 配置文件。
    ///
    /// #### 参数
    /// - `path`：JSON 文件路径。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::debug!("loading compositor configuration from {}", path.display());
        Self::from_json_str(&json)
    }

    /// ### English
    /// Applies `XIAN_COMPOSITOR_TARGET_FPS` if it is set to a valid integer.
    ///
    /// ### 中文
    /// 若设置了合法整数的 `XIAN_COMPOSITOR_TARGET_FPS`，则应用该值。
    pub fn apply_env_overrides(&mut self) {
        let Ok(value) = std::env::var(TARGET_FPS_ENV) else {
            return;
        };
        match value.trim().parse::<u32>() {
            Ok(fps) => {
                log::info!("{TARGET_FPS_ENV} overrides target_fps: {} -> {fps}", self.target_fps);
                self.target_fps = fps;
            }
            Err(_) => log::warn!("ignoring non-numeric {TARGET_FPS_ENV}={value:?}"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;

        if self.outputs.is_empty() {
            return Err(ConfigError::Invalid("at least one output is required".to_string()));
        }
        for (index, output) in self.outputs.iter().enumerate() {
            if output.size.width == 0 || output.size.height == 0 {
                return Err(ConfigError::Invalid(format!("output {index} has an empty size")));
            }
            if !(output.refresh_hz.is_finite() && output.refresh_hz > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "output {index} has an invalid refresh rate {}",
                    output.refresh_hz
                )));
            }
            if !(output.scale.is_finite() && output.scale > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "output {index} has an invalid scale {}",
                    output.scale
                )));
            }
        }
        Ok(())
    }
}
