//! ### English
//! Composition root: owns the display, the surface registry and the refresh driver.
//!
//! ### 中文
//! 组合根：持有显示端、surface 注册表以及 refresh driver。

use std::sync::Arc;

use dpi::PhysicalSize;

use crate::engine::buffer::BufferId;
use crate::engine::config::CompositorConfig;
use crate::engine::display::{CompositeOutcome, Display, DisplayReport, OutputId};
use crate::engine::error::RuntimeError;
use crate::engine::frame::FrameClock;
use crate::engine::platform::Platform;
use crate::engine::refresh::RefreshDriver;
use crate::engine::surface::{SurfaceHandle, SurfaceParams, SurfaceRegistry};

/// ### English
/// Compositor runtime. Explicitly constructed and explicitly shut down; there is no global
/// state.
///
/// ### 中文
/// 合成器运行时。显式构造、显式关闭；不存在全局状态。
pub struct CompositorRuntime {
    /// ### English
    /// Size used when a surface is created with an empty size.
    ///
    /// ### 中文
    /// 以空尺寸创建 surface 时使用的尺寸。
    default_surface_size: PhysicalSize<u32>,
    display: Arc<Display>,
    surfaces: SurfaceRegistry,
    /// ### English
    /// `None` once shut down.
    ///
    /// ### 中文
    /// 关闭后为 `None`。
    driver: Option<RefreshDriver>,
}

impl CompositorRuntime {
    /// ### English
    /// Validates `config`, builds the display and the surface registry over `platform`, and
    /// starts the refresh driver.
    ///
    /// #### Parameters
    /// - `config`: Compositor configuration.
    /// - `platform`: Allocator and post primitive.
    /// - `report`: Display observability sink.
    ///
    /// ### 中文
    /// 校验 `config`，基于 `platform` 构建显示端与 surface 注册表，并启动 refresh driver。
    ///
    /// #### 参数
    /// - `config`：合成器配置。
    /// - `platform`：分配器与 post 原语。
    /// - `report`：显示端可观测性接收端。
    pub fn new(
        config: CompositorConfig,
        platform: Platform,
        report: Arc<dyn DisplayReport>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let clock = Arc::new(FrameClock::new());
        let display = Arc::new(Display::from_config(
            &config,
            platform.post.clone(),
            clock.clone(),
            report,
        )?);
        let surfaces = SurfaceRegistry::new(platform.allocator.clone(), clock, config.queue.clone());
        let driver = RefreshDriver::for_target_fps(display.clone(), config.target_fps);

        log::info!(
            "compositor runtime started ({} outputs, {})",
            config.outputs.len(),
            if config.target_fps == 0 {
                "host vsync".to_string()
            } else {
                format!("{} fps timer", config.target_fps)
            }
        );
        Ok(Self {
            default_surface_size: config.default_surface_size,
            display,
            surfaces,
            driver: Some(driver),
        })
    }

    /// ### English
    /// Creates a surface. An empty size is replaced by the configured default size.
    ///
    /// ### 中文
    /// 创建 surface。空尺寸会被替换为配置的默认尺寸。
    pub fn create_surface(&self, mut params: SurfaceParams) -> Result<SurfaceHandle, RuntimeError> {
        self.check_running()?;
        if params.size.width == 0 || params.size.height == 0 {
            params.size = self.default_surface_size;
        }
        Ok(self.surfaces.create_surface(params)?)
    }

    /// ### English
    /// Detaches the surface from every output showing it, then destroys it.
    ///
    /// ### 中文
    /// 将 surface 从所有显示它的输出上解绑，然后销毁它。
    pub fn destroy_surface(&self, handle: SurfaceHandle) -> Result<(), RuntimeError> {
        let queue = self.surfaces.queue(handle)?;

        let mut outputs = Vec::new();
        self.display.for_each_display_sync_group(|group| {
            group.for_each_display_buffer(|buffer| {
                if buffer.queue().is_some_and(|attached| Arc::ptr_eq(attached, &queue)) {
                    outputs.push(buffer.output());
                }
            });
        });
        for output in outputs {
            self.display.detach(output)?;
        }

        Ok(self.surfaces.destroy_surface(handle)?)
    }

    pub fn swap_buffers(&self, handle: SurfaceHandle) -> Result<BufferId, RuntimeError> {
        self.check_running()?;
        Ok(self.surfaces.swap_buffers(handle)?)
    }

    pub fn current_buffer_id(&self, handle: SurfaceHandle) -> Result<BufferId, RuntimeError> {
        Ok(self.surfaces.current_buffer_id(handle)?)
    }

    pub fn resize_surface(
        &self,
        handle: SurfaceHandle,
        size: PhysicalSize<u32>,
    ) -> Result<(), RuntimeError> {
        Ok(self.surfaces.resize_surface(handle, size)?)
    }

    /// ### English
    /// Shows `handle` on `output`, replacing whatever surface was there.
    ///
    /// ### 中文
    /// 在 `output` 上显示 `handle`，替换原先在该输出上的 surface。
    pub fn attach_surface(&self, handle: SurfaceHandle, output: OutputId) -> Result<(), RuntimeError> {
        self.check_running()?;
        let queue = self.surfaces.queue(handle)?;
        self.display.attach(output, queue)?;
        Ok(())
    }

    /// ### English
    /// Host vsync tick (only composites with `target_fps == 0`).
    ///
    /// ### 中文
    /// 宿主 vsync tick（仅在 `target_fps == 0` 时合成）。
    pub fn tick(&self) -> Option<CompositeOutcome> {
        self.driver.as_ref()?.tick()
    }

    pub fn display(&self) -> &Arc<Display> {
        &self.display
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn is_shut_down(&self) -> bool {
        self.driver.is_none()
    }

    /// ### English
    /// Stops the refresh driver and closes every surface queue. Idempotent.
    ///
    /// ### 中文
    /// 停止 refresh driver 并关闭所有 surface 队列。幂等。
    pub fn shutdown(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.stop();
            self.surfaces.close_all();
            log::info!("compositor runtime shut down");
        }
    }

    fn check_running(&self) -> Result<(), RuntimeError> {
        if self.driver.is_none() {
            return Err(RuntimeError::ShutDown);
        }
        Ok(())
    }
}

impl Drop for CompositorRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::display::NullDisplayReport;
    use crate::engine::error::{QueueError, SurfaceError};
    use crate::engine::platform::HeadlessPlatform;

    fn runtime() -> (CompositorRuntime, Arc<HeadlessPlatform>) {
        let platform = Arc::new(HeadlessPlatform::new());
        let runtime = CompositorRuntime::new(
            CompositorConfig::default(),
            Platform::from_headless(platform.clone()),
            Arc::new(NullDisplayReport),
        )
        .unwrap();
        (runtime, platform)
    }

    #[test]
    fn swapped_frames_reach_the_screen_on_tick() {
        let (runtime, platform) = runtime();
        let surface = runtime
            .create_surface(SurfaceParams::new(PhysicalSize::new(0, 0)))
            .unwrap();
        assert_eq!(
            runtime.surfaces().queue(surface).unwrap().properties().size,
            PhysicalSize::new(1280, 720)
        );
        runtime.attach_surface(surface, OutputId(1)).unwrap();

        let drawn = runtime.current_buffer_id(surface).unwrap();
        runtime.swap_buffers(surface).unwrap();
        let outcome = runtime.tick().unwrap();

        assert_eq!(outcome.posted.len(), 1);
        assert_eq!(outcome.posted[0].buffer, drawn);
        assert_eq!(platform.on_screen(OutputId(1)), Some(drawn));
    }

    #[test]
    fn destroying_a_surface_detaches_it() {
        let (runtime, _platform) = runtime();
        let surface = runtime
            .create_surface(SurfaceParams::new(PhysicalSize::new(32, 32)))
            .unwrap();
        runtime.attach_surface(surface, OutputId(1)).unwrap();
        runtime.destroy_surface(surface).unwrap();

        let mut attached = Vec::new();
        runtime.display().for_each_display_sync_group(|group| {
            group.for_each_display_buffer(|buffer| attached.push(buffer.queue().is_some()))
        });
        assert_eq!(attached, vec![false]);
        assert!(runtime.surfaces().is_empty());
    }

    #[test]
    fn shutdown_closes_surfaces_and_rejects_new_work() {
        let (mut runtime, _platform) = runtime();
        let surface = runtime
            .create_surface(SurfaceParams::new(PhysicalSize::new(32, 32)))
            .unwrap();
        let queue = runtime.surfaces().queue(surface).unwrap();

        runtime.shutdown();
        runtime.shutdown();
        assert!(runtime.is_shut_down());
        assert!(queue.is_closed());
        assert!(runtime.tick().is_none());
        assert!(matches!(
            runtime.create_surface(SurfaceParams::new(PhysicalSize::new(1, 1))),
            Err(RuntimeError::ShutDown)
        ));
        assert!(matches!(
            runtime.current_buffer_id(surface),
            Err(RuntimeError::Surface(SurfaceError::UnknownSurface(_)))
        ));
        assert!(matches!(queue.acquire_for_producer(), Err(QueueError::Closed)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = CompositorConfig::default();
        config.outputs.clear();
        let result = CompositorRuntime::new(
            config,
            Platform::headless(),
            Arc::new(NullDisplayReport),
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
