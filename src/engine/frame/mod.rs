//! ### English
//! Global frame counter shared by the consumer (writer) and every producer (readers).
//!
//! ### 中文
//! 由消费者（写）与所有生产者（读）共享的全局帧计数器。
mod clock;

pub use clock::FrameClock;
