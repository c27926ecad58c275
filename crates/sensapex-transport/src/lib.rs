//! # Sensapex Transport Adapter Layer
//!
//! uMp 传输层抽象，定义控制核心与底层 UDP 协议库之间的边界。
//!
//! 传输层本身（报文格式、重传、地址发现）不在本 crate 中实现，
//! 这里只规定它必须提供的能力：
//! - 打开/关闭连接（[`Connector`] / [`Transport::close`]）
//! - 同步请求，返回整数状态码（负数表示错误）
//! - 查询最近一次错误码与 OS errno
//! - 共享的设备位置/状态快照缓冲区（[`SharedState`]）

use std::sync::Arc;
use thiserror::Error;

pub mod codes;
pub mod request;
pub mod state;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use request::{Request, RequestKind};
pub use state::{PositionRecord, SharedState};

/// 设备 ID（`0..MAX_DEVICES`）
pub type DeviceId = u32;

/// 传输层可寻址的设备数量上限
pub const MAX_DEVICES: usize = 254;

/// 单个设备的最大轴数
pub const MAX_AXES: usize = 4;

/// 默认广播地址
pub const DEFAULT_BROADCAST_ADDRESS: &str = "169.254.255.255";

/// 默认设备组
pub const DEFAULT_GROUP: i32 = 0;

/// 打开连接失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("open failed ({code}): {message}")]
pub struct OpenError {
    /// 传输层返回的错误码（非正数句柄）
    pub code: i32,
    /// 传输层给出的错误描述
    pub message: String,
}

impl OpenError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 已打开的传输句柄
///
/// 所有方法都是阻塞的，超时由请求参数或 `Request::SetTimeout` 设定。
/// 实现不需要自行加锁：会话层保证同一时刻只有一个线程调用。
pub trait Transport: Send {
    /// 发送一个请求并等待结果
    ///
    /// 返回值 `>= 0` 表示成功（含义取决于请求，例如轴数、状态码、收到的包数），
    /// 负数表示失败，具体原因通过 [`Transport::last_error`] 查询。
    fn call(&mut self, request: &Request) -> i32;

    /// 最近一次失败的错误码（见 [`codes`]）
    fn last_error(&self) -> i32;

    /// 最近一次 OS 级错误的 errno（仅当 `last_error() == codes::OS_ERROR` 时有意义）
    fn last_os_errno(&self) -> i32;

    /// 错误码对应的可读描述
    fn error_string(&self, code: i32) -> String;

    /// 共享的位置/状态快照
    ///
    /// 传输层在处理任意请求时都可能顺带刷新该缓冲区。
    fn shared_state(&self) -> Arc<SharedState>;

    /// 是否支持轴数查询（`Request::GetAxisCount`）
    fn supports_axis_count(&self) -> bool {
        true
    }

    /// 设备状态码是否表示“运动中”
    fn is_busy_status(&self, status: i32) -> bool;

    /// 底层库版本字符串
    fn version(&self) -> String;

    /// 释放句柄
    fn close(&mut self);
}

/// 传输连接工厂
pub trait Connector: Send + Sync {
    /// 打开到 `address`（广播地址）上 `group` 组设备的连接
    fn open(
        &self,
        address: &str,
        timeout_ms: u32,
        group: i32,
    ) -> Result<Box<dyn Transport>, OpenError>;
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn open(
        &self,
        address: &str,
        timeout_ms: u32,
        group: i32,
    ) -> Result<Box<dyn Transport>, OpenError> {
        (**self).open(address, timeout_ms, group)
    }
}
