//! 会话与轮询配置
//!
//! 所有时间字段都以整数毫秒表示，与传输层参数一致。
//! 可以直接构造，也可以从 TOML 加载：
//!
//! ```toml
//! address = "169.254.255.255"
//! group = 0
//! timeout_ms = 200
//! start_poller = true
//!
//! [poller]
//! interval_ms = 30
//! position_timeout_ms = 20
//! error_backoff_ms = 1000
//! ```

use sensapex_transport::{DEFAULT_BROADCAST_ADDRESS, DEFAULT_GROUP};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 轮询器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// 每轮接收等待时间（毫秒）
    pub interval_ms: u64,
    /// 读取被观察设备位置的超时（毫秒）
    pub position_timeout_ms: u32,
    /// 出错后的退避时间（毫秒）
    pub error_backoff_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30,
            position_timeout_ms: 20,
            error_backoff_ms: 1000,
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 广播地址
    pub address: String,
    /// 设备组
    pub group: i32,
    /// 默认请求超时（毫秒）
    pub timeout_ms: u32,
    /// 打开后是否立即启动轮询器
    pub start_poller: bool,
    /// 设备枚举期间使用的临时超时（毫秒）
    pub list_timeout_ms: u32,
    /// 阻塞运动时查询忙状态的间隔（毫秒）
    pub busy_poll_interval_ms: u64,
    pub poller: PollerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROADCAST_ADDRESS.to_string(),
            group: DEFAULT_GROUP,
            timeout_ms: 200,
            start_poller: true,
            list_timeout_ms: 20,
            busy_poll_interval_ms: 5,
            poller: PollerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// 指定地址和组，其余使用默认值
    pub fn new(address: impl Into<String>, group: i32) -> Self {
        Self {
            address: address.into(),
            group,
            ..Self::default()
        }
    }

    /// 从 TOML 字符串解析（缺省字段取默认值）
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
