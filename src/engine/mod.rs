/// ### English
/// Compositor core: buffers, per-surface queues, the display consumer and the runtime that wires
/// them together.
///
/// ### 中文
/// 合成器核心：缓冲区、每个 surface 的队列、显示端消费者，以及将它们组装在一起的运行时。
pub mod buffer;
pub(crate) mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod flags;
pub mod frame;
pub mod logging;
pub mod platform;
pub mod queue;
pub mod refresh;
pub mod runtime;
pub mod surface;

pub use buffer::{Buffer, BufferId, BufferProperties, BufferUsage, Fence, PixelFormat};
pub use config::{CompositorConfig, QueueConfig};
pub use display::{CompositeOutcome, Display, DisplayConfiguration, OutputId};
pub use error::{QueueError, RuntimeError, SurfaceError};
pub use frame::FrameClock;
pub use platform::Platform;
pub use queue::{BufferQueue, BufferQueueInit, ConsumerMode};
pub use runtime::CompositorRuntime;
pub use surface::{SurfaceHandle, SurfaceParams};
