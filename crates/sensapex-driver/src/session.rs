//! 会话：一个打开的传输句柄及其上的全部操作
//!
//! # 锁
//!
//! 一把可重入锁保护所有传输调用和轴数缓存。组合操作
//! （`goto_position`、`list_devices`、`receive_all` 等）在整个过程中持有锁，
//! 内部再调用其他加锁的原语。
//!
//! 观察者表使用独立的锁，注册/移除不会与进行中的传输调用竞争。
//!
//! # 关闭顺序
//!
//! 在轮询器槽锁内停止轮询器并取出传输句柄，之后等待轮询线程结束，
//! 最后关闭句柄。轮询线程不会访问已关闭的句柄，`close` 返回后也不会有
//! 新的轮询线程启动。
//!
//! 锁顺序：轮询器槽锁在前，会话锁在后。

use crate::Position;
use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::observer::{ObserverId, ObserverSnapshot, ObserverTable};
use crate::planner::{self, MIN_SPEED, MoveOptions};
use crate::poller::{PollSource, Poller};
use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, ReentrantMutex};
use sensapex_transport::{
    Connector, DeviceId, MAX_AXES, MAX_DEVICES, Request, SharedState, Transport, codes,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// `list_devices` 默认探测的设备 ID 上限
pub const DEFAULT_LIST_MAX_ID: usize = 20;

struct Inner {
    transport: Option<Box<dyn Transport>>,
    timeout_ms: u32,
    /// 设备 ID → 轴数（查询一次后永久缓存）
    axis_counts: HashMap<DeviceId, usize>,
}

/// uMp 会话
///
/// 通过 [`Session::new`] 或 [`Session::open_with`] 创建，总是以 `Arc` 持有。
/// 释放最后一个引用时自动关闭。
pub struct Session {
    connector: Box<dyn Connector>,
    config: SessionConfig,
    inner: ReentrantMutex<RefCell<Inner>>,
    /// 传输层共享缓冲区的只读视图（关闭后为空）
    state: ArcSwapOption<SharedState>,
    observers: ObserverTable,
    poller: Mutex<Poller>,
    self_ref: Weak<Session>,
}

impl Session {
    /// 创建未打开的会话
    pub fn new(connector: impl Connector + 'static, config: SessionConfig) -> Arc<Self> {
        let timeout_ms = config.timeout_ms;
        let poller = Poller::new(config.poller.clone());
        Arc::new_cyclic(|self_ref| Session {
            connector: Box::new(connector),
            config,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                transport: None,
                timeout_ms,
                axis_counts: HashMap::new(),
            })),
            state: ArcSwapOption::empty(),
            observers: ObserverTable::new(),
            poller: Mutex::new(poller),
            self_ref: self_ref.clone(),
        })
    }

    /// 创建并打开会话，按配置启动轮询器
    pub fn open_with(
        connector: impl Connector + 'static,
        config: SessionConfig,
    ) -> Result<Arc<Self>, DriverError> {
        let session = Self::new(connector, config);
        session.open(&session.config.address, session.config.group)?;
        if session.config.start_poller {
            session.start_poller()?;
        }
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 打开到 `address` 上 `group` 组设备的连接
    pub fn open(&self, address: &str, group: i32) -> Result<(), DriverError> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.transport.is_some() {
            return Err(DriverError::AlreadyOpen);
        }

        let transport = self
            .connector
            .open(address, inner.timeout_ms, group)
            .map_err(|e| DriverError::Connection {
                address: address.to_string(),
                group,
                code: e.code,
                message: e.message,
            })?;

        self.state.store(Some(transport.shared_state()));
        inner.transport = Some(transport);
        info!("Opened uMp session at {} (group {})", address, group);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().borrow().transport.is_some()
    }

    /// 关闭会话：停止并等待轮询线程，然后释放传输句柄
    ///
    /// 已关闭时为空操作。
    pub fn close(&self) {
        // 槽锁覆盖停止与取出句柄，期间 start_poller 无法启动新线程
        let (mut poller, transport) = {
            let mut slot = self.poller.lock();
            slot.stop();
            let poller = std::mem::replace(&mut *slot, Poller::new(self.config.poller.clone()));

            let guard = self.inner.lock();
            let transport = guard.borrow_mut().transport.take();
            if transport.is_some() {
                self.state.store(None);
            }
            (poller, transport)
        };

        // 在锁外等待，回调线程中调用 close 时不会相互阻塞
        poller.join();
        if let Some(mut transport) = transport {
            transport.close();
            info!("Closed uMp session");
        }
    }

    /// 当前默认超时（毫秒）
    pub fn timeout(&self) -> u32 {
        self.inner.lock().borrow().timeout_ms
    }

    /// 设置默认超时并同步到传输层
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<(), DriverError> {
        let guard = self.inner.lock();
        if guard.borrow().transport.is_none() {
            return Err(DriverError::NotOpen);
        }
        guard.borrow_mut().timeout_ms = timeout_ms;
        self.call(&Request::SetTimeout { timeout_ms })?;
        Ok(())
    }

    /// 临时修改超时，返回的守卫在释放时恢复原值
    fn scoped_timeout(&self, timeout_ms: u32) -> Result<TimeoutGuard<'_>, DriverError> {
        let guard = TimeoutGuard {
            session: self,
            previous: self.timeout(),
        };
        self.set_timeout(timeout_ms)?;
        Ok(guard)
    }

    /// 发送一个请求，把负返回值映射为错误
    ///
    /// 所有传输调用都经过这里。
    pub fn call(&self, request: &Request) -> Result<i32, DriverError> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let transport = inner.transport.as_mut().ok_or(DriverError::NotOpen)?;

        let rval = transport.call(request);
        if rval >= 0 {
            trace!("{} -> {}", request, rval);
            return Ok(rval);
        }

        let code = transport.last_error();
        if code == codes::OS_ERROR {
            return Err(DriverError::os(transport.last_os_errno()));
        }
        Err(DriverError::Device {
            code,
            message: transport.error_string(code),
            request: request.to_string(),
        })
    }

    /// 传输层共享缓冲区
    pub fn shared_state(&self) -> Result<Arc<SharedState>, DriverError> {
        self.state.load_full().ok_or(DriverError::NotOpen)
    }

    /// 底层库版本
    pub fn sdk_version(&self) -> Result<String, DriverError> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let transport = inner.transport.as_ref().ok_or(DriverError::NotOpen)?;
        Ok(transport.version())
    }

    /// 设备轴数
    ///
    /// 优先使用缓存（包括手动设置的值）；传输层不支持查询时返回 4 且不缓存。
    pub fn axis_count(&self, dev: DeviceId) -> Result<usize, DriverError> {
        check_device(dev)?;
        let guard = self.inner.lock();

        let cached = guard.borrow().axis_counts.get(&dev).copied();
        if let Some(count) = cached {
            return Ok(count);
        }

        let supported = guard
            .borrow()
            .transport
            .as_ref()
            .ok_or(DriverError::NotOpen)?
            .supports_axis_count();
        if !supported {
            return Ok(MAX_AXES);
        }

        let count = (self.call(&Request::GetAxisCount { dev })? as usize).min(MAX_AXES);
        guard.borrow_mut().axis_counts.insert(dev, count);
        debug!("Device {} has {} axes", dev, count);
        Ok(count)
    }

    /// 手动设置设备轴数（覆盖查询结果）
    pub fn set_axis_count(&self, dev: DeviceId, count: usize) -> Result<(), DriverError> {
        check_device(dev)?;
        if !(1..=MAX_AXES).contains(&count) {
            return Err(DriverError::InvalidArgument(format!(
                "axis count must be 1..={}, got {}",
                MAX_AXES, count
            )));
        }
        self.inner.lock().borrow_mut().axis_counts.insert(dev, count);
        Ok(())
    }

    /// 读取设备位置（纳米）
    ///
    /// `timeout_ms`：`None` 使用会话默认超时；解析为 0 时直接读取缓存，
    /// 不发起位置查询；否则先向设备查询再读取缓存。
    ///
    /// 轴数未缓存时，首次读取会先发送一次 `GetAxisCount`。
    pub fn get_position(
        &self,
        dev: DeviceId,
        timeout_ms: Option<u32>,
    ) -> Result<Position, DriverError> {
        check_device(dev)?;
        let _lock = self.inner.lock();

        let timeout_ms = timeout_ms.unwrap_or_else(|| self.timeout());
        if timeout_ms > 0 {
            self.call(&Request::GetPositions { dev, timeout_ms })?;
        }

        let record = self
            .shared_state()?
            .position(dev)
            .ok_or(DriverError::InvalidDevice(dev))?;
        let count = self.axis_count(dev)?;
        Ok(record.axes()[..count].iter().copied().collect())
    }

    /// 移动到绝对位置
    ///
    /// `speed`（µm/s）小于 1 时按 1 处理。`options.block` 为真时
    /// 每隔 `busy_poll_interval_ms` 查询一次，直到设备不再忙。
    pub fn goto_position(
        &self,
        dev: DeviceId,
        target: &[i32],
        speed: f64,
        options: MoveOptions,
    ) -> Result<(), DriverError> {
        check_device(dev)?;
        if target.is_empty() || target.len() > MAX_AXES {
            return Err(DriverError::InvalidArgument(format!(
                "target must have 1..={} axes, got {}",
                MAX_AXES,
                target.len()
            )));
        }
        let speed = speed.max(MIN_SPEED);

        {
            let _lock = self.inner.lock();
            let current = self.get_position(dev, Some(0))?;
            let plan = planner::plan_move(&current, target, speed, options);
            debug!(
                "Moving device {} to {:?} (speeds {:?}, mode {})",
                dev, plan.target, plan.speeds, plan.mode
            );
            self.call(&plan.to_request(dev))?;
            self.receive(1)?;
        }

        if options.block {
            let interval = Duration::from_millis(self.config.busy_poll_interval_ms);
            while self.is_busy(dev)? {
                spin_sleep::sleep(interval);
            }
        }
        Ok(())
    }

    /// 设备是否正在运动
    pub fn is_busy(&self, dev: DeviceId) -> Result<bool, DriverError> {
        check_device(dev)?;
        let guard = self.inner.lock();
        self.receive(10)?;
        let status = self.call(&Request::GetStatus { dev })?;

        let inner = guard.borrow();
        let transport = inner.transport.as_ref().ok_or(DriverError::NotOpen)?;
        Ok(transport.is_busy_status(status))
    }

    /// 停止所有设备
    pub fn stop_all(&self) -> Result<(), DriverError> {
        self.call(&Request::StopAll)?;
        Ok(())
    }

    /// 停止单个设备
    pub fn stop(&self, dev: DeviceId) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::Stop { dev })?;
        Ok(())
    }

    /// 列出 `0..min(max_id, MAX_DEVICES)` 中存在的设备
    ///
    /// 探测期间临时使用 `list_timeout_ms`，结束后（包括出错时）恢复。
    pub fn list_devices(&self, max_id: usize) -> Result<Vec<DeviceId>, DriverError> {
        let _lock = self.inner.lock();
        let _timeout = self.scoped_timeout(self.config.list_timeout_ms)?;

        let mut devices = Vec::new();
        for dev in 0..max_id.min(MAX_DEVICES) as DeviceId {
            match self.get_position(dev, None) {
                Ok(_) => devices.push(dev),
                Err(e) if e.is_device_missing() => {},
                Err(e) => return Err(e),
            }
        }
        debug!("Found devices: {:?}", devices);
        Ok(devices)
    }

    /// 处理一个待处理的状态包，返回其来源设备
    ///
    /// 没有待处理的包时返回 [`DriverError::Timeout`]。
    pub fn receive_one(&self) -> Result<Option<DeviceId>, DriverError> {
        let _lock = self.inner.lock();
        let count = self.call(&Request::Receive { time_limit_ms: 0 })?;
        if count == 0 {
            return Err(DriverError::Timeout);
        }
        Ok(self.shared_state()?.last_device_received())
    }

    /// 处理所有待处理的状态包，按到达顺序返回不重复的来源设备
    pub fn receive_all(&self) -> Result<Vec<DeviceId>, DriverError> {
        let _lock = self.inner.lock();
        let _timeout = self.scoped_timeout(0)?;

        let mut devices = Vec::new();
        loop {
            match self.receive_one() {
                Ok(Some(dev)) => {
                    if !devices.contains(&dev) {
                        devices.push(dev);
                    }
                },
                Ok(None) => {},
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(devices)
    }

    /// 在控制单元上选中设备
    pub fn select(&self, dev: DeviceId) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::CuSelectManipulator { dev })?;
        Ok(())
    }

    /// 在控制单元上激活/停用设备
    pub fn set_active(&self, dev: DeviceId, active: bool) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::CuSetActive { dev, active })?;
        Ok(())
    }

    pub fn set_pressure(&self, dev: DeviceId, channel: u32, value: i32) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::SetPressure {
            dev,
            channel,
            value,
        })?;
        Ok(())
    }

    pub fn get_pressure(&self, dev: DeviceId, channel: u32) -> Result<i32, DriverError> {
        check_device(dev)?;
        self.call(&Request::GetPressure { dev, channel })
    }

    pub fn set_valve(&self, dev: DeviceId, channel: u32, value: i32) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::SetValve {
            dev,
            channel,
            value,
        })?;
        Ok(())
    }

    pub fn get_valve(&self, dev: DeviceId, channel: u32) -> Result<i32, DriverError> {
        check_device(dev)?;
        self.call(&Request::GetValve { dev, channel })
    }

    /// 开关自定义低速模式
    pub fn set_custom_slow_speed(&self, dev: DeviceId, enabled: bool) -> Result<(), DriverError> {
        check_device(dev)?;
        self.call(&Request::SetExtFeature {
            dev,
            feature: codes::FEATURE_CUSTOM_SLOW_SPEED,
            enabled,
        })?;
        Ok(())
    }

    pub fn custom_slow_speed(&self, dev: DeviceId) -> Result<bool, DriverError> {
        check_device(dev)?;
        let value = self.call(&Request::GetExtFeature {
            dev,
            feature: codes::FEATURE_CUSTOM_SLOW_SPEED,
        })?;
        Ok(value != 0)
    }

    /// 注册位置变化回调，返回用于移除的令牌
    pub fn add_observer<F>(&self, dev: DeviceId, callback: F) -> Result<ObserverId, DriverError>
    where
        F: Fn(DeviceId, &[i32], Option<&[i32]>) + Send + Sync + 'static,
    {
        check_device(dev)?;
        Ok(self.observers.add(dev, Arc::new(callback)))
    }

    /// 移除位置变化回调，返回是否找到
    pub fn remove_observer(&self, dev: DeviceId, id: ObserverId) -> bool {
        self.observers.remove(dev, id)
    }

    /// 某个设备注册的回调数量
    pub fn observer_count(&self, dev: DeviceId) -> usize {
        self.observers.count(dev)
    }

    /// 启动轮询器
    ///
    /// 之前的轮询器已停止时创建新的轮询器；观察者注册保留在会话上。
    pub fn start_poller(&self) -> Result<(), DriverError> {
        let mut poller = self.poller.lock();
        if !self.is_open() {
            return Err(DriverError::NotOpen);
        }
        if poller.is_stopped() {
            *poller = Poller::new(self.config.poller.clone());
        }
        let source: Weak<dyn PollSource> = self.self_ref.clone();
        poller.start(source)
    }

    /// 停止轮询器并等待线程结束
    pub fn stop_poller(&self) {
        self.shutdown_poller();
    }

    pub fn is_poller_running(&self) -> bool {
        self.poller.lock().is_running()
    }

    fn shutdown_poller(&self) {
        // 在锁外等待，回调线程中调用 close 时不会相互阻塞
        let mut poller = {
            let mut slot = self.poller.lock();
            slot.stop();
            std::mem::replace(&mut *slot, Poller::new(self.config.poller.clone()))
        };
        poller.join();
    }

    /// 接收入站包，没有包视为正常
    fn receive(&self, time_limit_ms: u32) -> Result<(), DriverError> {
        match self.call(&Request::Receive { time_limit_ms }) {
            Err(e) if e.is_timeout() => Ok(()),
            other => other.map(drop),
        }
    }
}

impl PollSource for Session {
    fn drain(&self, wait_ms: u64) -> Result<(), DriverError> {
        self.receive(u32::try_from(wait_ms).unwrap_or(u32::MAX))
    }

    fn poll_position(&self, dev: DeviceId, timeout_ms: u32) -> Result<Position, DriverError> {
        self.get_position(dev, Some(timeout_ms))
    }

    fn observers(&self) -> ObserverSnapshot {
        self.observers.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address)
            .field("group", &self.config.group)
            .field("open", &self.is_open())
            .finish()
    }
}

/// 超时恢复守卫
///
/// 必须在会话锁之后声明，保证恢复发生在锁释放之前。
struct TimeoutGuard<'a> {
    session: &'a Session,
    previous: u32,
}

impl Drop for TimeoutGuard<'_> {
    fn drop(&mut self) {
        if !self.session.is_open() {
            return;
        }
        if let Err(e) = self.session.set_timeout(self.previous) {
            warn!("Failed to restore timeout to {} ms: {}", self.previous, e);
        }
    }
}

fn check_device(dev: DeviceId) -> Result<(), DriverError> {
    if dev as usize >= MAX_DEVICES {
        return Err(DriverError::InvalidDevice(dev));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensapex_transport::RequestKind;
    use sensapex_transport::mock::{MockBus, MockConnector, MockDevice};

    fn open_session(bus: &MockBus) -> Arc<Session> {
        let config = SessionConfig {
            start_poller: false,
            ..SessionConfig::default()
        };
        Session::open_with(MockConnector::new(bus.clone()), config).unwrap()
    }

    #[test]
    fn test_open_twice() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        assert!(matches!(
            session.open("169.254.255.255", 0),
            Err(DriverError::AlreadyOpen)
        ));
        assert_eq!(bus.open_count(), 1);
        assert_eq!(bus.timeout_ms(), 200);
    }

    #[test]
    fn test_open_failure_maps_to_connection_error() {
        let bus = MockBus::new();
        bus.fail_open(Some(sensapex_transport::OpenError::new(0, "no route")));
        let session = Session::new(MockConnector::new(bus), SessionConfig::default());

        match session.open("10.0.0.255", 3) {
            Err(DriverError::Connection {
                address,
                group,
                message,
                ..
            }) => {
                assert_eq!(address, "10.0.0.255");
                assert_eq!(group, 3);
                assert_eq!(message, "no route");
            },
            other => panic!("Expected Connection error, got {:?}", other),
        }
        assert!(!session.is_open());
    }

    #[test]
    fn test_not_open() {
        let session = Session::new(MockConnector::new(MockBus::new()), SessionConfig::default());
        assert!(matches!(session.stop_all(), Err(DriverError::NotOpen)));
        assert!(matches!(
            session.get_position(1, Some(0)),
            Err(DriverError::NotOpen)
        ));
        assert!(matches!(session.start_poller(), Err(DriverError::NotOpen)));
        // 关闭未打开的会话为空操作
        session.close();
    }

    #[test]
    fn test_call_error_mapping() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        let session = open_session(&bus);

        bus.set_os_errno(104);
        bus.fail_next(RequestKind::GetStatus, codes::OS_ERROR);
        match session.call(&Request::GetStatus { dev: 1 }) {
            Err(DriverError::Os { errno, .. }) => assert_eq!(errno, 104),
            other => panic!("Expected Os error, got {:?}", other),
        }

        match session.call(&Request::GetStatus { dev: 9 }) {
            Err(DriverError::Device { code, request, .. }) => {
                assert_eq!(code, codes::INVALID_DEVICE);
                assert!(request.contains("ump_get_status_ext"));
            },
            other => panic!("Expected Device error, got {:?}", other),
        }
    }

    #[test]
    fn test_axis_count_cached() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        let session = open_session(&bus);

        assert_eq!(session.axis_count(1).unwrap(), 3);
        assert_eq!(session.axis_count(1).unwrap(), 3);
        assert_eq!(bus.call_count(RequestKind::GetAxisCount), 1);
    }

    #[test]
    fn test_axis_count_unsupported() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        bus.set_supports_axis_count(false);
        let session = open_session(&bus);

        assert_eq!(session.axis_count(1).unwrap(), 4);
        assert_eq!(bus.call_count(RequestKind::GetAxisCount), 0);
    }

    #[test]
    fn test_axis_count_override() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(4, [1, 2, 3, 4]));
        let session = open_session(&bus);

        session.set_axis_count(1, 3).unwrap();
        assert_eq!(session.get_position(1, None).unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(bus.call_count(RequestKind::GetAxisCount), 0);
        assert!(matches!(
            session.set_axis_count(1, 5),
            Err(DriverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_device_rejected_locally() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        assert!(matches!(
            session.get_position(MAX_DEVICES as DeviceId, None),
            Err(DriverError::InvalidDevice(_))
        ));
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_goto_plans_from_cached_position() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        let session = open_session(&bus);
        bus.clear_calls();

        session
            .goto_position(1, &[100, 0, 0], 10.0, MoveOptions::default())
            .unwrap();

        let calls = bus.calls();
        assert_eq!(
            calls,
            vec![
                Request::GetAxisCount { dev: 1 },
                Request::GotoPosition {
                    dev: 1,
                    target: [100, 0, 0, 0],
                    speeds: [32, 32, 32, 0],
                    mode: 1,
                },
                Request::Receive { time_limit_ms: 1 },
            ]
        );
    }

    #[test]
    fn test_goto_blocking_waits_until_idle() {
        let bus = MockBus::new();
        bus.add_device(2, MockDevice::new(4, [0; 4]).with_busy_polls_per_move(3));
        let session = open_session(&bus);

        session
            .goto_position(2, &[10, 20, 30, 40], 0.0, MoveOptions::default().blocking(true))
            .unwrap();

        // 3 次“忙”之后一次“空闲”
        assert_eq!(bus.call_count(RequestKind::GetStatus), 4);
        assert!(!session.is_busy(2).unwrap());
    }

    #[test]
    fn test_goto_rejects_bad_target() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        let session = open_session(&bus);
        assert!(matches!(
            session.goto_position(1, &[], 100.0, MoveOptions::default()),
            Err(DriverError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.goto_position(1, &[0; 5], 100.0, MoveOptions::default()),
            Err(DriverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_control_unit_and_channels() {
        let bus = MockBus::new();
        bus.add_device(1, MockDevice::new(3, [0; 4]));
        let session = open_session(&bus);

        session.select(1).unwrap();
        assert_eq!(bus.cu_selected(), Some(1));
        session.set_active(1, true).unwrap();
        assert!(bus.device(1).unwrap().cu_active);

        session.set_pressure(1, 2, 150).unwrap();
        assert_eq!(session.get_pressure(1, 2).unwrap(), 150);
        session.set_valve(1, 0, 1).unwrap();
        assert_eq!(session.get_valve(1, 0).unwrap(), 1);

        assert!(!session.custom_slow_speed(1).unwrap());
        session.set_custom_slow_speed(1, true).unwrap();
        assert!(session.custom_slow_speed(1).unwrap());

        assert_eq!(session.sdk_version().unwrap(), "mock-0.1");
    }

    #[test]
    fn test_set_timeout() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        session.set_timeout(75).unwrap();
        assert_eq!(session.timeout(), 75);
        assert_eq!(bus.timeout_ms(), 75);
    }

    #[test]
    fn test_set_timeout_when_closed_keeps_value() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        session.close();

        assert!(matches!(session.set_timeout(75), Err(DriverError::NotOpen)));
        assert_eq!(session.timeout(), 200);
    }

    #[test]
    fn test_close_releases_transport() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        session.close();
        session.close();
        assert_eq!(bus.close_count(), 1);
        assert!(!session.is_open());
        assert!(matches!(session.shared_state(), Err(DriverError::NotOpen)));
    }

    #[test]
    fn test_drop_closes() {
        let bus = MockBus::new();
        let session = open_session(&bus);
        drop(session);
        assert_eq!(bus.close_count(), 1);
    }
}
