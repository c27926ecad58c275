//! 单设备句柄
//!
//! 对 [`Session`] 的轻量封装，所有操作都使用句柄自己的设备 ID。
//! 句柄只持有会话的弱引用：会话释放后，所有操作返回
//! [`DriverError::NotOpen`]。

use parking_lot::Mutex;
use sensapex_driver::{DeviceId, DriverError, MoveOptions, ObserverId, Position, Session};
use std::sync::{Arc, Weak};

/// 单个 uMp 设备
///
/// 同一个设备 ID 可以有多个句柄。每个句柄最多注册一个位置变化回调，
/// 句柄释放时自动移除。
///
/// # 示例
///
/// ```rust,ignore
/// let device = Device::new(&session, 1);
/// let mut position = device.position(None)?;
/// position[0] += 10_000; // x 轴前进 10 µm
/// device.goto_position(&position, 10.0, MoveOptions::default())?;
/// ```
pub struct Device {
    session: Weak<Session>,
    id: DeviceId,
    callback: Mutex<Option<ObserverId>>,
}

impl Device {
    pub fn new(session: &Arc<Session>, id: DeviceId) -> Self {
        Self {
            session: Arc::downgrade(session),
            id,
            callback: Mutex::new(None),
        }
    }

    /// 创建句柄并手动指定轴数
    ///
    /// 用于无法正确报告轴数的设备；设置对同一会话上的所有句柄生效。
    pub fn with_axis_count(
        session: &Arc<Session>,
        id: DeviceId,
        axis_count: usize,
    ) -> Result<Self, DriverError> {
        session.set_axis_count(id, axis_count)?;
        Ok(Self::new(session, id))
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    fn session(&self) -> Result<Arc<Session>, DriverError> {
        self.session.upgrade().ok_or(DriverError::NotOpen)
    }

    pub fn axis_count(&self) -> Result<usize, DriverError> {
        self.session()?.axis_count(self.id)
    }

    /// 读取位置，`timeout_ms` 含义同 [`Session::get_position`]
    pub fn position(&self, timeout_ms: Option<u32>) -> Result<Position, DriverError> {
        self.session()?.get_position(self.id, timeout_ms)
    }

    pub fn goto_position(
        &self,
        target: &[i32],
        speed: f64,
        options: MoveOptions,
    ) -> Result<(), DriverError> {
        self.session()?.goto_position(self.id, target, speed, options)
    }

    pub fn is_busy(&self) -> Result<bool, DriverError> {
        self.session()?.is_busy(self.id)
    }

    pub fn stop(&self) -> Result<(), DriverError> {
        self.session()?.stop(self.id)
    }

    pub fn select(&self) -> Result<(), DriverError> {
        self.session()?.select(self.id)
    }

    pub fn set_active(&self, active: bool) -> Result<(), DriverError> {
        self.session()?.set_active(self.id, active)
    }

    pub fn pressure(&self, channel: u32) -> Result<i32, DriverError> {
        self.session()?.get_pressure(self.id, channel)
    }

    pub fn set_pressure(&self, channel: u32, value: i32) -> Result<(), DriverError> {
        self.session()?.set_pressure(self.id, channel, value)
    }

    pub fn valve(&self, channel: u32) -> Result<i32, DriverError> {
        self.session()?.get_valve(self.id, channel)
    }

    pub fn set_valve(&self, channel: u32, value: i32) -> Result<(), DriverError> {
        self.session()?.set_valve(self.id, channel, value)
    }

    pub fn custom_slow_speed(&self) -> Result<bool, DriverError> {
        self.session()?.custom_slow_speed(self.id)
    }

    pub fn set_custom_slow_speed(&self, enabled: bool) -> Result<(), DriverError> {
        self.session()?.set_custom_slow_speed(self.id, enabled)
    }

    /// 设置位置变化回调，替换本句柄之前设置的回调
    ///
    /// 回调参数为 `(设备 ID, 新位置, 旧位置)`，在轮询线程上执行。
    pub fn set_change_callback<F>(&self, callback: F) -> Result<(), DriverError>
    where
        F: Fn(DeviceId, &[i32], Option<&[i32]>) + Send + Sync + 'static,
    {
        let session = self.session()?;
        let mut slot = self.callback.lock();
        if let Some(previous) = slot.take() {
            session.remove_observer(self.id, previous);
        }
        *slot = Some(session.add_observer(self.id, callback)?);
        Ok(())
    }

    /// 移除本句柄的回调，返回之前是否设置过
    pub fn clear_change_callback(&self) -> bool {
        let Some(id) = self.callback.lock().take() else {
            return false;
        };
        if let Some(session) = self.session.upgrade() {
            session.remove_observer(self.id, id);
        }
        true
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.clear_change_callback();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("has_callback", &self.callback.lock().is_some())
            .finish()
    }
}
