//! ### English
//! Observability sink for display events. Delivery is best-effort and never blocks the consumer.
//!
//! ### 中文
//! 显示事件的可观测性接收端。投递为尽力而为，且从不阻塞消费者。

use crate::engine::error::PostError;

use super::{DisplayConfiguration, OutputId};

pub trait DisplayReport: Send + Sync {
    fn report_successful_display_construction(&self);

    fn report_configuration(&self, configuration: &DisplayConfiguration);

    /// ### English
    /// `output` was posted as part of frame `frame`.
    ///
    /// ### 中文
    /// `output` 作为第 `frame` 帧的一部分完成了 post。
    fn report_vsync(&self, output: OutputId, frame: u64);

    fn report_post_failed(&self, output: OutputId, error: &PostError);
}

/// ### English
/// Discards every report.
///
/// ### 中文
/// 丢弃所有报告。
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDisplayReport;

impl DisplayReport for NullDisplayReport {
    fn report_successful_display_construction(&self) {}

    fn report_configuration(&self, _configuration: &DisplayConfiguration) {}

    fn report_vsync(&self, _output: OutputId, _frame: u64) {}

    fn report_post_failed(&self, _output: OutputId, _error: &PostError) {}
}

/// ### English
/// Writes reports through the `log` facade.
///
/// ### 中文
/// 通过 `log` facade 输出报告。
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDisplayReport;

impl DisplayReport for LoggingDisplayReport {
    fn report_successful_display_construction(&self) {
        log::info!("display construction successful");
    }

    fn report_configuration(&self, configuration: &DisplayConfiguration) {
        log::info!("display configuration ({} outputs):", configuration.outputs.len());
        configuration.for_each_output(|output| {
            let mode = output
                .mode()
                .map(|mode| {
                    format!(
                        "{}x{}@{:.1}Hz",
                        mode.size.width, mode.size.height, mode.refresh_hz
                    )
                })
                .unwrap_or_else(|| "no mode".to_string());
            log::info!(
                "  output {}: {} {:?} scale {} at ({}, {}){}{}",
                output.id,
                mode,
                output.orientation,
                output.scale,
                output.top_left.x,
                output.top_left.y,
                if output.connected { "" } else { " disconnected" },
                if output.used { "" } else { " unused" },
            );
        });
    }

    fn report_vsync(&self, output: OutputId, frame: u64) {
        log::trace!("vsync on output {output}: frame {frame}");
    }

    fn report_post_failed(&self, output: OutputId, error: &PostError) {
        log::warn!("post failed on output {output}: {error}");
    }
}
