//! Mock 传输层
//!
//! 纯内存的 uMp 网络模拟，用于在没有硬件的情况下测试控制核心。
//!
//! - [`MockBus`]：测试侧持有的脚本/检查句柄（可克隆）
//! - [`MockConnector`]：实现 [`Connector`]，打开后得到 [`MockTransport`]
//!
//! # 示例
//!
//! ```rust,ignore
//! use sensapex_transport::mock::{MockBus, MockConnector, MockDevice};
//! use sensapex_transport::{Connector, Request};
//!
//! let bus = MockBus::new();
//! bus.add_device(1, MockDevice::new(3, [0, 0, 0, 0]));
//!
//! let connector = MockConnector::new(bus.clone());
//! let mut transport = connector.open("169.254.255.255", 200, 0).unwrap();
//! assert_eq!(transport.call(&Request::GetAxisCount { dev: 1 }), 3);
//! ```

use crate::codes;
use crate::{
    Connector, DeviceId, MAX_AXES, OpenError, Request, RequestKind, SharedState, Transport,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Mock 设备报告“运动中”时使用的状态码
pub const MOCK_BUSY_STATUS: i32 = 1;

/// Mock OS 错误默认使用的 errno（EIO）
pub const MOCK_DEFAULT_ERRNO: i32 = 5;

/// 模拟设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    /// 设备当前位置（纳米）
    pub position: [i32; MAX_AXES],
    /// 轴数
    pub axis_count: i32,
    /// 空闲时的状态码
    pub status: i32,
    /// 接下来多少次状态查询返回“运动中”
    pub busy_polls: u32,
    /// 每次运动命令后设置的 `busy_polls`
    pub busy_polls_per_move: u32,
    pub cu_active: bool,
    pub pressure: BTreeMap<u32, i32>,
    pub valve: BTreeMap<u32, i32>,
    pub features: BTreeMap<i32, i32>,
}

impl MockDevice {
    pub fn new(axis_count: i32, position: [i32; MAX_AXES]) -> Self {
        Self {
            position,
            axis_count,
            status: 0,
            busy_polls: 0,
            busy_polls_per_move: 0,
            cu_active: false,
            pressure: BTreeMap::new(),
            valve: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }

    /// 每次运动命令后保持“运动中”的状态查询次数
    pub fn with_busy_polls_per_move(mut self, polls: u32) -> Self {
        self.busy_polls_per_move = polls;
        self
    }
}

/// 模拟的入站状态包
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPacket {
    pub dev: DeviceId,
    pub position: Option<[i32; MAX_AXES]>,
    pub status: Option<i32>,
}

impl MockPacket {
    /// 只携带设备 ID 的包（例如心跳）
    pub const fn from_device(dev: DeviceId) -> Self {
        Self {
            dev,
            position: None,
            status: None,
        }
    }

    /// 携带位置的包
    pub const fn position(dev: DeviceId, position: [i32; MAX_AXES]) -> Self {
        Self {
            dev,
            position: Some(position),
            status: None,
        }
    }
}

struct MockHardware {
    devices: BTreeMap<DeviceId, MockDevice>,
    inbound: VecDeque<MockPacket>,
    failures: HashMap<RequestKind, VecDeque<i32>>,
    calls: Vec<Request>,
    counts: HashMap<RequestKind, usize>,
    timeout_ms: u32,
    supports_axis_count: bool,
    missing_device_code: i32,
    os_errno: i32,
    open_error: Option<OpenError>,
    open_count: usize,
    close_count: usize,
    cu_selected: Option<DeviceId>,
    last_error: i32,
    last_os_errno: i32,
    clock: u32,
}

impl MockHardware {
    fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            inbound: VecDeque::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            counts: HashMap::new(),
            timeout_ms: 0,
            supports_axis_count: true,
            missing_device_code: codes::INVALID_DEVICE,
            os_errno: MOCK_DEFAULT_ERRNO,
            open_error: None,
            open_count: 0,
            close_count: 0,
            cu_selected: None,
            last_error: codes::NO_ERROR,
            last_os_errno: 0,
            clock: 0,
        }
    }

    fn fail(&mut self, code: i32) -> i32 {
        self.last_error = code;
        if code == codes::OS_ERROR {
            self.last_os_errno = self.os_errno;
        }
        -1
    }

    fn tick(&mut self) -> u32 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }
}

/// Mock 网络句柄（测试侧）
#[derive(Clone)]
pub struct MockBus {
    hw: Arc<Mutex<MockHardware>>,
    state: Arc<SharedState>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            hw: Arc::new(Mutex::new(MockHardware::new())),
            state: Arc::new(SharedState::new()),
        }
    }

    /// 添加（或替换）一个设备
    pub fn add_device(&self, dev: DeviceId, device: MockDevice) {
        self.hw.lock().devices.insert(dev, device);
    }

    /// 移除设备（之后对它的请求返回“设备不存在”）
    pub fn remove_device(&self, dev: DeviceId) {
        self.hw.lock().devices.remove(&dev);
    }

    /// 读取设备模型
    pub fn device(&self, dev: DeviceId) -> Option<MockDevice> {
        self.hw.lock().devices.get(&dev).cloned()
    }

    /// 修改设备真实位置（不刷新缓存，下一次实时读取或状态包才可见）
    pub fn set_position(&self, dev: DeviceId, position: [i32; MAX_AXES]) {
        if let Some(device) = self.hw.lock().devices.get_mut(&dev) {
            device.position = position;
        }
    }

    /// 直接改写共享缓存中的位置（模拟传输层后台刷新）
    pub fn set_cached_position(&self, dev: DeviceId, position: [i32; MAX_AXES]) {
        let updated = self.hw.lock().tick();
        self.state.store_position(dev, position, updated);
    }

    /// 设置设备“运动中”的剩余状态查询次数
    pub fn set_busy_polls(&self, dev: DeviceId, polls: u32) {
        if let Some(device) = self.hw.lock().devices.get_mut(&dev) {
            device.busy_polls = polls;
        }
    }

    /// 入队一个状态包
    pub fn push_packet(&self, packet: MockPacket) {
        self.hw.lock().inbound.push_back(packet);
    }

    /// 尚未被接收的状态包数量
    pub fn pending_packets(&self) -> usize {
        self.hw.lock().inbound.len()
    }

    /// 让下一次 `kind` 请求以 `code` 失败（可多次调用排队）
    pub fn fail_next(&self, kind: RequestKind, code: i32) {
        self.hw
            .lock()
            .failures
            .entry(kind)
            .or_default()
            .push_back(code);
    }

    /// 设置 OS 错误时报告的 errno
    pub fn set_os_errno(&self, errno: i32) {
        self.hw.lock().os_errno = errno;
    }

    /// 设置访问不存在设备时返回的错误码（默认 `-5`）
    pub fn set_missing_device_code(&self, code: i32) {
        self.hw.lock().missing_device_code = code;
    }

    /// 模拟不支持轴数查询的旧版本库
    pub fn set_supports_axis_count(&self, supported: bool) {
        self.hw.lock().supports_axis_count = supported;
    }

    /// 让后续的打开操作失败
    pub fn fail_open(&self, error: Option<OpenError>) {
        self.hw.lock().open_error = error;
    }

    /// 某类请求的调用次数
    pub fn call_count(&self, kind: RequestKind) -> usize {
        self.hw.lock().counts.get(&kind).copied().unwrap_or(0)
    }

    /// 全部请求记录（按调用顺序）
    pub fn calls(&self) -> Vec<Request> {
        self.hw.lock().calls.clone()
    }

    /// 清空请求记录和计数
    pub fn clear_calls(&self) {
        let mut hw = self.hw.lock();
        hw.calls.clear();
        hw.counts.clear();
    }

    /// 传输层当前的默认超时
    pub fn timeout_ms(&self) -> u32 {
        self.hw.lock().timeout_ms
    }

    pub fn open_count(&self) -> usize {
        self.hw.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.hw.lock().close_count
    }

    /// 控制单元上当前选中的设备
    pub fn cu_selected(&self) -> Option<DeviceId> {
        self.hw.lock().cu_selected
    }

    pub fn shared_state(&self) -> Arc<SharedState> {
        self.state.clone()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock 连接工厂
#[derive(Clone)]
pub struct MockConnector {
    bus: MockBus,
}

impl MockConnector {
    pub fn new(bus: MockBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &MockBus {
        &self.bus
    }
}

impl Connector for MockConnector {
    fn open(
        &self,
        _address: &str,
        timeout_ms: u32,
        _group: i32,
    ) -> Result<Box<dyn Transport>, OpenError> {
        let mut hw = self.bus.hw.lock();
        if let Some(error) = hw.open_error.clone() {
            return Err(error);
        }
        hw.open_count += 1;
        hw.timeout_ms = timeout_ms;
        Ok(Box::new(MockTransport {
            bus: self.bus.clone(),
        }))
    }
}

/// Mock 传输句柄
pub struct MockTransport {
    bus: MockBus,
}

impl Transport for MockTransport {
    fn call(&mut self, request: &Request) -> i32 {
        let state = &self.bus.state;
        let mut hw = self.bus.hw.lock();
        let kind = request.kind();
        hw.calls.push(*request);
        *hw.counts.entry(kind).or_default() += 1;

        if let Some(code) = hw.failures.get_mut(&kind).and_then(VecDeque::pop_front) {
            return hw.fail(code);
        }

        if let Some(dev) = request.device()
            && !hw.devices.contains_key(&dev)
        {
            let code = hw.missing_device_code;
            return hw.fail(code);
        }

        match *request {
            Request::SetTimeout { timeout_ms } => {
                hw.timeout_ms = timeout_ms;
                0
            },
            Request::GetAxisCount { dev } => {
                if !hw.supports_axis_count {
                    return hw.fail(codes::INVALID_ARG);
                }
                hw.devices[&dev].axis_count
            },
            Request::GetPositions { dev, timeout_ms } => {
                let device = &hw.devices[&dev];
                let (position, axis_count) = (device.position, device.axis_count);
                if timeout_ms > 0 {
                    let updated = hw.tick();
                    state.store_position(dev, position, updated);
                }
                axis_count
            },
            Request::GotoPosition { dev, target, .. } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.position = target;
                    device.busy_polls = device.busy_polls_per_move;
                }
                hw.inbound.push_back(MockPacket::position(dev, target));
                0
            },
            Request::Receive { time_limit_ms } => {
                let limit = if time_limit_ms == 0 { 1 } else { usize::MAX };
                let mut count = 0;
                while count < limit {
                    let Some(packet) = hw.inbound.pop_front() else {
                        break;
                    };
                    let updated = hw.tick();
                    if let Some(position) = packet.position {
                        state.store_position(packet.dev, position, updated);
                    }
                    if let Some(status) = packet.status {
                        state.store_status(packet.dev, status);
                    }
                    state.store_last_device_received(packet.dev);
                    count += 1;
                }
                if count == 0 && time_limit_ms > 0 {
                    // 与真实传输层一样，没有包时等待到时限
                    drop(hw);
                    std::thread::sleep(Duration::from_millis(u64::from(time_limit_ms)));
                }
                count as i32
            },
            Request::GetStatus { dev } => {
                let status = match hw.devices.get_mut(&dev) {
                    Some(device) if device.busy_polls > 0 => {
                        device.busy_polls -= 1;
                        MOCK_BUSY_STATUS
                    },
                    Some(device) => device.status,
                    None => 0,
                };
                state.store_status(dev, status);
                status
            },
            Request::StopAll => {
                for device in hw.devices.values_mut() {
                    device.busy_polls = 0;
                }
                0
            },
            Request::Stop { dev } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.busy_polls = 0;
                }
                0
            },
            Request::CuSelectManipulator { dev } => {
                hw.cu_selected = Some(dev);
                0
            },
            Request::CuSetActive { dev, active } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.cu_active = active;
                }
                0
            },
            Request::SetPressure {
                dev,
                channel,
                value,
            } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.pressure.insert(channel, value);
                }
                0
            },
            Request::GetPressure { dev, channel } => hw.devices[&dev]
                .pressure
                .get(&channel)
                .copied()
                .unwrap_or(0),
            Request::SetValve {
                dev,
                channel,
                value,
            } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.valve.insert(channel, value);
                }
                0
            },
            Request::GetValve { dev, channel } => {
                hw.devices[&dev].valve.get(&channel).copied().unwrap_or(0)
            },
            Request::SetExtFeature {
                dev,
                feature,
                enabled,
            } => {
                if let Some(device) = hw.devices.get_mut(&dev) {
                    device.features.insert(feature, i32::from(enabled));
                }
                0
            },
            Request::GetExtFeature { dev, feature } => hw.devices[&dev]
                .features
                .get(&feature)
                .copied()
                .unwrap_or(0),
        }
    }

    fn last_error(&self) -> i32 {
        self.bus.hw.lock().last_error
    }

    fn last_os_errno(&self) -> i32 {
        self.bus.hw.lock().last_os_errno
    }

    fn error_string(&self, code: i32) -> String {
        codes::describe(code).to_string()
    }

    fn shared_state(&self) -> Arc<SharedState> {
        self.bus.state.clone()
    }

    fn supports_axis_count(&self) -> bool {
        self.bus.hw.lock().supports_axis_count
    }

    fn is_busy_status(&self, status: i32) -> bool {
        status == MOCK_BUSY_STATUS
    }

    fn version(&self) -> String {
        "mock-0.1".to_string()
    }

    fn close(&mut self) {
        self.bus.hw.lock().close_count += 1;
    }
}
