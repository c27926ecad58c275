//! # Sensapex Driver
//!
//! uMp 控制核心：会话、运动规划与位置轮询。
//!
//! - [`Session`]：持有一个传输句柄，所有调用经过同一把可重入锁
//! - [`planner`]：按位移比例合成每轴速度
//! - [`Poller`]：后台线程，检测位置变化并通知观察者
//! - [`SessionRegistry`]：每个 `(address, group)` 一个会话
//!
//! # 示例
//!
//! ```rust,ignore
//! use sensapex_driver::{MoveOptions, Session, SessionConfig};
//! use sensapex_transport::mock::{MockBus, MockConnector, MockDevice};
//!
//! let bus = MockBus::new();
//! bus.add_device(1, MockDevice::new(3, [0; 4]));
//!
//! let session = Session::open_with(MockConnector::new(bus), SessionConfig::default())?;
//! session.goto_position(1, &[1000, 2000, 3000], 500.0, MoveOptions::default().blocking(true))?;
//! ```

pub mod config;
mod error;
pub mod observer;
pub mod planner;
pub mod poller;
pub mod registry;
mod session;

pub use config::{ConfigError, PollerConfig, SessionConfig};
pub use error::DriverError;
pub use observer::{ObserverId, ObserverTable, PositionCallback};
pub use planner::{MotionPlan, MoveOptions};
pub use poller::{PollSource, Poller, PollerState};
pub use registry::SessionRegistry;
pub use session::{DEFAULT_LIST_MAX_ID, Session};

pub use sensapex_transport::{DeviceId, MAX_AXES, MAX_DEVICES};

/// 设备位置（纳米），长度等于设备轴数
pub type Position = smallvec::SmallVec<[i32; MAX_AXES]>;
