//! 请求选择器
//!
//! 每个变体对应底层协议库的一个函数调用，携带该调用的全部参数。

use crate::{DeviceId, MAX_AXES};
use std::fmt;

/// 传输层请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// 设置默认超时（毫秒）
    SetTimeout { timeout_ms: u32 },
    /// 查询设备轴数
    GetAxisCount { dev: DeviceId },
    /// 读取设备位置；`timeout_ms == 0` 时只返回缓存
    GetPositions { dev: DeviceId, timeout_ms: u32 },
    /// 运动到绝对位置（纳米），每轴独立速度（µm/s）
    GotoPosition {
        dev: DeviceId,
        target: [i32; MAX_AXES],
        speeds: [i32; MAX_AXES],
        mode: i32,
    },
    /// 接收待处理的状态包，最多等待 `time_limit_ms`
    ///
    /// 返回收到的包数；`time_limit_ms == 0` 时最多接收一个包。
    Receive { time_limit_ms: u32 },
    /// 查询设备状态码
    GetStatus { dev: DeviceId },
    /// 停止所有设备
    StopAll,
    /// 停止指定设备
    Stop { dev: DeviceId },
    /// 在控制单元（CU）上选中设备
    CuSelectManipulator { dev: DeviceId },
    /// 设置控制单元能否移动设备
    CuSetActive { dev: DeviceId, active: bool },
    /// 设置压力通道
    SetPressure { dev: DeviceId, channel: u32, value: i32 },
    /// 读取压力通道
    GetPressure { dev: DeviceId, channel: u32 },
    /// 设置阀门通道
    SetValve { dev: DeviceId, channel: u32, value: i32 },
    /// 读取阀门通道
    GetValve { dev: DeviceId, channel: u32 },
    /// 设置扩展特性开关
    SetExtFeature { dev: DeviceId, feature: i32, enabled: bool },
    /// 读取扩展特性开关
    GetExtFeature { dev: DeviceId, feature: i32 },
}

/// 请求类型（不含参数），用于统计和错误注入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    SetTimeout,
    GetAxisCount,
    GetPositions,
    GotoPosition,
    Receive,
    GetStatus,
    StopAll,
    Stop,
    CuSelectManipulator,
    CuSetActive,
    SetPressure,
    GetPressure,
    SetValve,
    GetValve,
    SetExtFeature,
    GetExtFeature,
}

impl RequestKind {
    /// 对应的底层函数名
    pub const fn name(self) -> &'static str {
        match self {
            RequestKind::SetTimeout => "ump_set_timeout",
            RequestKind::GetAxisCount => "ump_get_axis_count_ext",
            RequestKind::GetPositions => "ump_get_positions_ext",
            RequestKind::GotoPosition => "ump_goto_position_ext2",
            RequestKind::Receive => "ump_receive",
            RequestKind::GetStatus => "ump_get_status_ext",
            RequestKind::StopAll => "ump_stop_all",
            RequestKind::Stop => "ump_stop_ext",
            RequestKind::CuSelectManipulator => "ump_cu_select_manipulator",
            RequestKind::CuSetActive => "ump_cu_set_active",
            RequestKind::SetPressure => "umv_set_pressure",
            RequestKind::GetPressure => "umv_get_pressure",
            RequestKind::SetValve => "umv_set_valve",
            RequestKind::GetValve => "umv_get_valve",
            RequestKind::SetExtFeature => "ump_set_ext_feature",
            RequestKind::GetExtFeature => "ump_get_ext_feature",
        }
    }
}

impl Request {
    pub const fn kind(&self) -> RequestKind {
        match self {
            Request::SetTimeout { .. } => RequestKind::SetTimeout,
            Request::GetAxisCount { .. } => RequestKind::GetAxisCount,
            Request::GetPositions { .. } => RequestKind::GetPositions,
            Request::GotoPosition { .. } => RequestKind::GotoPosition,
            Request::Receive { .. } => RequestKind::Receive,
            Request::GetStatus { .. } => RequestKind::GetStatus,
            Request::StopAll => RequestKind::StopAll,
            Request::Stop { .. } => RequestKind::Stop,
            Request::CuSelectManipulator { .. } => RequestKind::CuSelectManipulator,
            Request::CuSetActive { .. } => RequestKind::CuSetActive,
            Request::SetPressure { .. } => RequestKind::SetPressure,
            Request::GetPressure { .. } => RequestKind::GetPressure,
            Request::SetValve { .. } => RequestKind::SetValve,
            Request::GetValve { .. } => RequestKind::GetValve,
            Request::SetExtFeature { .. } => RequestKind::SetExtFeature,
            Request::GetExtFeature { .. } => RequestKind::GetExtFeature,
        }
    }

    /// 请求针对的设备（广播类请求返回 `None`）
    pub const fn device(&self) -> Option<DeviceId> {
        match *self {
            Request::SetTimeout { .. } | Request::Receive { .. } | Request::StopAll => None,
            Request::GetAxisCount { dev }
            | Request::GetPositions { dev, .. }
            | Request::GotoPosition { dev, .. }
            | Request::GetStatus { dev }
            | Request::Stop { dev }
            | Request::CuSelectManipulator { dev }
            | Request::CuSetActive { dev, .. }
            | Request::SetPressure { dev, .. }
            | Request::GetPressure { dev, .. }
            | Request::SetValve { dev, .. }
            | Request::GetValve { dev, .. }
            | Request::SetExtFeature { dev, .. }
            | Request::GetExtFeature { dev, .. } => Some(dev),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().name();
        match *self {
            Request::SetTimeout { timeout_ms } => write!(f, "{name}({timeout_ms})"),
            Request::GetAxisCount { dev }
            | Request::GetStatus { dev }
            | Request::Stop { dev }
            | Request::CuSelectManipulator { dev } => write!(f, "{name}({dev})"),
            Request::GetPositions { dev, timeout_ms } => write!(f, "{name}({dev}, {timeout_ms})"),
            Request::GotoPosition {
                dev,
                target,
                speeds,
                mode,
            } => write!(f, "{name}({dev}, {target:?}, {speeds:?}, {mode})"),
            Request::Receive { time_limit_ms } => write!(f, "{name}({time_limit_ms})"),
            Request::StopAll => write!(f, "{name}()"),
            Request::CuSetActive { dev, active } => write!(f, "{name}({dev}, {})", i32::from(active)),
            Request::SetPressure {
                dev,
                channel,
                value,
            }
            | Request::SetValve {
                dev,
                channel,
                value,
            } => write!(f, "{name}({dev}, {channel}, {value})"),
            Request::GetPressure { dev, channel } | Request::GetValve { dev, channel } => {
                write!(f, "{name}({dev}, {channel})")
            },
            Request::SetExtFeature {
                dev,
                feature,
                enabled,
            } => write!(f, "{name}({dev}, {feature}, {})", i32::from(enabled)),
            Request::GetExtFeature { dev, feature } => write!(f, "{name}({dev}, {feature})"),
        }
    }
}
