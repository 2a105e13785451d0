#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;
use xian_compositor::engine::flags::SurfaceFlags;
use xian_compositor::engine::platform::HeadlessPlatform;
use xian_compositor::{
    BufferProperties, BufferQueue, BufferQueueInit, BufferUsage, FrameClock, PixelFormat,
    QueueConfig,
};

/// Upper bound for anything a test waits on; a hang turns into a failure instead.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn properties() -> BufferProperties {
    BufferProperties::new(
        PhysicalSize::new(4, 4),
        PixelFormat::Argb8888,
        BufferUsage::Software,
    )
}

pub fn queue(config: QueueConfig) -> (Arc<BufferQueue>, Arc<FrameClock>) {
    queue_on(Arc::new(HeadlessPlatform::new()), config)
}

/// Queue whose buffers come from `platform`; queues sharing a platform never share buffer ids.
pub fn queue_on(
    platform: Arc<HeadlessPlatform>,
    config: QueueConfig,
) -> (Arc<BufferQueue>, Arc<FrameClock>) {
    let clock = Arc::new(FrameClock::new());
    let queue = BufferQueue::new(BufferQueueInit {
        properties: properties(),
        config,
        allocator: platform,
        clock: clock.clone(),
        flags: SurfaceFlags::default(),
    })
    .unwrap();
    (queue, clock)
}
