//! 驱动层错误类型定义

use crate::config::ConfigError;
use sensapex_transport::{DeviceId, codes};
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 会话未打开（或已关闭）
    #[error("Session is not open")]
    NotOpen,

    /// 会话重复打开
    #[error("Session is already open")]
    AlreadyOpen,

    /// 打开传输连接失败
    #[error("Error connecting to uMp at {address} (group {group}): {message}")]
    Connection {
        address: String,
        group: i32,
        code: i32,
        message: String,
    },

    /// 传输层报告 OS 级错误
    #[error("uMp OS error {errno}: {message}")]
    Os { errno: i32, message: String },

    /// 传输层报告协议/设备错误
    #[error("uMp error {code}: {message} from {request}")]
    Device {
        code: i32,
        message: String,
        /// 失败的调用描述（函数名与参数）
        request: String,
    },

    /// 接收超时：没有待处理的包
    #[error("Receive timeout: no packet pending")]
    Timeout,

    /// 设备 ID 超出传输层范围
    #[error("Invalid device id: {0}")]
    InvalidDevice(DeviceId),

    /// 参数无效
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 轮询器已停止，不能重新启动
    #[error("Poller has been stopped and cannot be restarted")]
    PollerStopped,

    /// 轮询线程启动失败
    #[error("Poller thread error: {0}")]
    PollerThread(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DriverError {
    /// 根据 errno 构造 OS 错误
    pub fn os(errno: i32) -> Self {
        DriverError::Os {
            errno,
            message: std::io::Error::from_raw_os_error(errno).to_string(),
        }
    }

    /// 传输层错误码（如有）
    pub fn code(&self) -> Option<i32> {
        match self {
            DriverError::Os { .. } => Some(codes::OS_ERROR),
            DriverError::Device { code, .. } => Some(*code),
            DriverError::Timeout => Some(codes::TIMEOUT),
            _ => None,
        }
    }

    /// 是否表示“等待期内没有待处理的包”
    pub fn is_timeout(&self) -> bool {
        self.code() == Some(codes::TIMEOUT)
    }

    /// 是否表示“设备不存在”
    pub fn is_device_missing(&self) -> bool {
        matches!(self, DriverError::Device { code, .. } if codes::is_device_missing(*code))
    }
}
