//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use sensapex_sdk::prelude::*;
//! ```

pub use crate::device::Device;
pub use crate::logging::init_logger;

// 驱动层
pub use crate::driver::{
    DEFAULT_LIST_MAX_ID, MoveOptions, PollerConfig, Position, Session, SessionConfig,
    SessionRegistry,
};

// 传输层
pub use crate::transport::{Connector, DeviceId, MAX_AXES, MAX_DEVICES};

// 错误类型
pub use crate::driver::{ConfigError, DriverError};
pub use crate::transport::OpenError;
