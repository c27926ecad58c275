//! Sensapex SDK - Sensapex uMp 显微操作器 Rust SDK
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **传输层** (`transport`): 传输边界、错误码、共享状态缓冲区
//! - **驱动层** (`driver`): 会话、运动规划、位置轮询
//! - **设备句柄** ([`Device`]): 单设备操作与位置变化回调
//!
//! # 快速开始
//!
//! ```rust,ignore
//! use sensapex_sdk::prelude::*;
//!
//! init_logger();
//! let session = Session::open_with(connector, SessionConfig::default())?;
//! for id in session.list_devices(DEFAULT_LIST_MAX_ID)? {
//!     let device = Device::new(&session, id);
//!     println!("{}: {:?}", id, device.position(None)?);
//! }
//! ```

pub mod device;
pub mod logging;
pub mod prelude;

pub use sensapex_driver as driver;
pub use sensapex_transport as transport;

pub use device::Device;
pub use driver::{
    DriverError, MoveOptions, ObserverId, Position, Session, SessionConfig, SessionRegistry,
};
pub use logging::{init_logger, init_logger_with};
pub use transport::{Connector, DeviceId, Transport};
