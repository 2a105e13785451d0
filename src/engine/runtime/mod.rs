//! ### English
//! Compositor runtime orchestration (public API).
//!
//! ### 中文
//! 合成器运行时编排（对外公开 API）。

mod compositor_runtime;

pub use compositor_runtime::CompositorRuntime;
