use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// ### English
/// One-shot completion signal shared between the thread doing work and the thread waiting on it.
///
/// Used both as the producer-ready indicator on a `Buffer` ("GPU writes are done") and as the
/// platform completion signal returned by a post ("scanout no longer reads this buffer").
/// `Fence::signaled()` is the no-op variant for platforms without real synchronization.
///
/// ### 中文
/// 在执行工作的线程与等待它的线程之间共享的一次性完成信号。
///
/// 既用作 `Buffer` 上的生产者就绪标记（“GPU 写入已完成”），也用作 post 返回的平台完成信号
/// （“扫描输出不再读取该缓冲区”）。`Fence::signaled()` 是无真实同步平台使用的空操作变体。
#[derive(Debug, Default)]
pub struct Fence {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Fence {
    /// ### English
    /// Creates an unsignaled fence.
    ///
    /// ### 中文
    /// 创建一个未触发的 fence。
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Creates a fence that is already signaled (waits return immediately).
    ///
    /// ### 中文
    /// 创建一个已触发的 fence（等待会立即返回）。
    pub fn signaled() -> Self {
        Self {
            signaled: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        if !*signaled {
            *signaled = true;
            self.cond.notify_all();
        }
    }

    /// ### English
    /// Re-arms the fence for the next use of the buffer.
    ///
    /// ### 中文
    /// 重新布防 fence，供缓冲区下一次使用。
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// ### English
    /// Waits until the fence is signaled or `timeout` elapses. Returns whether it was signaled.
    ///
    /// #### Parameters
    /// - `timeout`: Upper bound on the wait.
    ///
    /// ### 中文
    /// 等待 fence 被触发或 `timeout` 到期。返回是否已触发。
    ///
    /// #### 参数
    /// - `timeout`：等待上限。
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.signaled.lock();
        if *signaled {
            return true;
        }
        let _ = self
            .cond
            .wait_while_for(&mut signaled, |signaled| !*signaled, timeout);
        *signaled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Fence;

    #[test]
    fn signaled_fence_never_blocks() {
        let fence = Fence::signaled();
        assert!(fence.is_signaled());
        assert!(fence.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn wait_times_out_then_observes_signal_from_other_thread() {
        let fence = Arc::new(Fence::new());
        assert!(!fence.wait_timeout(Duration::from_millis(5)));

        let signaller = {
            let fence = fence.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                fence.signal();
            })
        };
        assert!(fence.wait_timeout(Duration::from_secs(5)));
        signaller.join().unwrap();

        fence.reset();
        assert!(!fence.is_signaled());
    }
}
