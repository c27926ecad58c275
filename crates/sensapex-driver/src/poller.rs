//! 位置轮询线程
//!
//! 后台线程循环执行：
//!
//! 1. 接收并处理入站状态包（等待 `interval_ms`）
//! 2. 克隆观察者表快照
//! 3. 对每个被观察的设备读取位置，与上次看到的位置比较，
//!    变化时依次调用该设备的所有回调，然后记录新位置
//!
//! 任何错误（包括数据源或回调中的 panic）都只记录日志，
//! 并在退避 `error_backoff_ms` 后进入下一轮；
//! 只有显式停止（或会话已释放）才会结束循环。
//!
//! 线程只持有会话的弱引用（[`PollSource`]），不会延长会话的生命周期。

use crate::Position;
use crate::config::PollerConfig;
use crate::error::DriverError;
use crate::observer::ObserverSnapshot;
use crossbeam_channel::{Receiver, Sender};
use sensapex_transport::DeviceId;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

/// 轮询线程需要的数据源（由会话实现）
pub trait PollSource: Send + Sync {
    /// 处理入站状态包，最多等待 `wait_ms` 毫秒
    fn drain(&self, wait_ms: u64) -> Result<(), DriverError>;

    /// 读取设备位置
    fn poll_position(&self, dev: DeviceId, timeout_ms: u32) -> Result<Position, DriverError>;

    /// 当前观察者表的快照
    fn observers(&self) -> ObserverSnapshot;
}

/// 轮询器生命周期：`Idle → Running → Stopped`，停止后不能重新启动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopped,
}

/// 位置轮询器
pub struct Poller {
    config: PollerConfig,
    state: PollerState,
    shutdown: Arc<AtomicBool>,
    /// 丢弃发送端即可唤醒退避中的线程
    wake_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            state: PollerState::Idle,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake_tx: None,
            handle: None,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// 启动轮询线程
    ///
    /// 已在运行时为空操作；已停止时返回 [`DriverError::PollerStopped`]。
    pub fn start(&mut self, source: Weak<dyn PollSource>) -> Result<(), DriverError> {
        match self.state {
            PollerState::Running => return Ok(()),
            PollerState::Stopped => return Err(DriverError::PollerStopped),
            PollerState::Idle => {},
        }

        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let shutdown = self.shutdown.clone();
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("sensapex-poller".into())
            .spawn(move || poll_loop(source, config, shutdown, wake_rx))
            .map_err(|e| DriverError::PollerThread(e.to_string()))?;

        debug!(
            "Poller started (interval {} ms, backoff {} ms)",
            self.config.interval_ms, self.config.error_backoff_ms
        );
        self.wake_tx = Some(wake_tx);
        self.handle = Some(handle);
        self.state = PollerState::Running;
        Ok(())
    }

    /// 设置停止标志并唤醒线程（不等待线程结束）
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake_tx.take();
        self.state = PollerState::Stopped;
    }

    /// 等待线程结束
    ///
    /// 在轮询线程自身上调用时（例如回调中释放了最后一个会话引用）不等待。
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!("Poller thread panicked");
        }
    }

    /// 停止并等待线程结束
    pub fn shutdown(&mut self) {
        self.stop();
        self.join();
    }

    pub fn is_running(&self) -> bool {
        self.state == PollerState::Running
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PollerState::Stopped
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(
    source: Weak<dyn PollSource>,
    config: PollerConfig,
    shutdown: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
) {
    let backoff = Duration::from_millis(config.error_backoff_ms);
    let mut last_seen: HashMap<DeviceId, Position> = HashMap::new();

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        let Some(source) = source.upgrade() else {
            debug!("Session dropped, poller exiting");
            break;
        };
        let result = catch_unwind(AssertUnwindSafe(|| {
            poll_once(source.as_ref(), &config, &mut last_seen)
        }));
        drop(source);

        let failed = match result {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                error!("Error in poller loop: {}", e);
                true
            },
            Err(_) => {
                error!("Poller iteration panicked");
                true
            },
        };
        if failed {
            // 停止时发送端被丢弃，等待立即返回
            let _ = wake_rx.recv_timeout(backoff);
        }
    }
    trace!("Poller loop finished");
}

/// 执行一轮轮询
fn poll_once(
    source: &dyn PollSource,
    config: &PollerConfig,
    last_seen: &mut HashMap<DeviceId, Position>,
) -> Result<(), DriverError> {
    source.drain(config.interval_ms)?;

    for (dev, callbacks) in source.observers() {
        let position = source.poll_position(dev, config.position_timeout_ms)?;
        let previous = last_seen.get(&dev);
        if previous == Some(&position) {
            continue;
        }

        for callback in &callbacks {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                callback(dev, &position, previous.map(|p| p.as_slice()))
            }));
            if outcome.is_err() {
                error!("Position observer for device {} panicked", dev);
            }
        }
        last_seen.insert(dev, position);
    }
    Ok(())
}
