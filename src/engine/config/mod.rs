//! ### English
//! Configuration records (serde) for the queue, the outputs and the compositor as a whole.
//!
//! ### 中文
//! 队列、输出以及合成器整体的配置记录（serde）。
mod compositor;
mod queue;

pub use compositor::{CompositorConfig, DisplayOutputConfig, TARGET_FPS_ENV};
pub use queue::QueueConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::display::Orientation;
    use crate::engine::error::ConfigError;

    #[test]
    fn defaults_are_valid() {
        CompositorConfig::default().validate().unwrap();
        assert_eq!(QueueConfig::default().initial_buffers(), 3);
    }

    #[test]
    fn queue_validation_rejects_bad_bounds() {
        let single = QueueConfig::fixed(1);
        assert!(matches!(single.validate(), Err(ConfigError::Invalid(_))));

        let inverted = QueueConfig {
            min_buffers: 3,
            max_buffers: 2,
            ..QueueConfig::default()
        };
        assert!(inverted.validate().is_err());

        let unreachable_threshold = QueueConfig {
            min_free_for_acquire: 3,
            ..QueueConfig::default()
        };
        assert!(unreachable_threshold.validate().is_err());

        let zero_threshold = QueueConfig {
            min_free_for_acquire: 0,
            ..QueueConfig::default()
        };
        assert!(zero_threshold.validate().is_err());
    }

    #[test]
    fn dynamic_scaling_starts_at_min() {
        let config = QueueConfig {
            dynamic_scaling: true,
            min_buffers: 2,
            max_buffers: 4,
            ..QueueConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.initial_buffers(), 2);
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let config = CompositorConfig::from_json_str(
            r#"{
                "target_fps": 30,
                "queue": { "max_buffers": 4 },
                "outputs": [{ "size": { "width": 800, "height": 600 }, "orientation": "left" }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.target_fps, 30);
        assert_eq!(config.queue.max_buffers, 4);
        assert_eq!(config.queue.min_buffers, 2);
        assert_eq!(config.outputs.len(), 1);
        assert_eq!(config.outputs[0].size.width, 800);
        assert_eq!(config.outputs[0].orientation, Orientation::Left);
        assert_eq!(config.outputs[0].refresh_hz, 60.0);
    }

    #[test]
    fn rejects_invalid_json_and_invalid_values() {
        assert!(matches!(
            CompositorConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CompositorConfig::from_json_str(r#"{ "outputs": [] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CompositorConfig::from_json_str(r#"{ "outputs": [{ "refresh_hz": 0.0 }] }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = CompositorConfig::from_path("/nonexistent/xian-compositor.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn serializes_back_to_equivalent_json() {
        let config = CompositorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CompositorConfig::from_json_str(&json).unwrap(), config);
    }
}
