//! 共享状态缓冲区
//!
//! 传输层写入、控制核心读取的设备位置/状态快照。
//!
//! # 并发模型
//!
//! - 写入方：传输层（处理请求或接收状态包时顺带刷新）
//! - 读取方：任意线程，无锁
//! - 每个字段是独立的原子字，读取只可能“过期”，不会“撕裂”单个字段

use crate::{DeviceId, MAX_AXES, MAX_DEVICES};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// 单个设备最近一次上报的位置（纳米）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub w: i32,
    /// 最近一次更新的时间戳（传输层时钟，毫秒）
    pub updated: u32,
}

impl PositionRecord {
    /// 四个轴的坐标
    pub const fn axes(&self) -> [i32; MAX_AXES] {
        [self.x, self.y, self.z, self.w]
    }
}

#[derive(Default)]
struct DeviceSlot {
    axes: [AtomicI32; MAX_AXES],
    updated: AtomicU32,
    status: AtomicI32,
}

/// 按设备 ID 索引的位置/状态快照
pub struct SharedState {
    slots: Box<[DeviceSlot]>,
    /// 最近一个发来状态包的设备（-1 表示尚未收到）
    last_device_received: AtomicI32,
}

impl SharedState {
    /// 创建空缓冲区（所有位置为 0，所有状态为 0）
    pub fn new() -> Self {
        let slots = (0..MAX_DEVICES).map(|_| DeviceSlot::default()).collect();
        Self {
            slots,
            last_device_received: AtomicI32::new(-1),
        }
    }

    fn slot(&self, dev: DeviceId) -> Option<&DeviceSlot> {
        self.slots.get(dev as usize)
    }

    /// 读取设备位置快照，设备 ID 超出范围时返回 `None`
    pub fn position(&self, dev: DeviceId) -> Option<PositionRecord> {
        let slot = self.slot(dev)?;
        Some(PositionRecord {
            x: slot.axes[0].load(Ordering::Acquire),
            y: slot.axes[1].load(Ordering::Acquire),
            z: slot.axes[2].load(Ordering::Acquire),
            w: slot.axes[3].load(Ordering::Acquire),
            updated: slot.updated.load(Ordering::Acquire),
        })
    }

    /// 读取设备状态码快照
    pub fn status(&self, dev: DeviceId) -> Option<i32> {
        self.slot(dev).map(|slot| slot.status.load(Ordering::Acquire))
    }

    /// 最近一个发来状态包的设备
    pub fn last_device_received(&self) -> Option<DeviceId> {
        let dev = self.last_device_received.load(Ordering::Acquire);
        DeviceId::try_from(dev).ok()
    }

    // ------------------------------------------------------------
    // 以下方法仅供传输层实现使用
    // ------------------------------------------------------------

    /// 写入设备位置（超出范围的 ID 被忽略）
    pub fn store_position(&self, dev: DeviceId, axes: [i32; MAX_AXES], updated: u32) {
        if let Some(slot) = self.slot(dev) {
            for (cell, value) in slot.axes.iter().zip(axes) {
                cell.store(value, Ordering::Release);
            }
            slot.updated.store(updated, Ordering::Release);
        }
    }

    /// 写入设备状态码
    pub fn store_status(&self, dev: DeviceId, status: i32) {
        if let Some(slot) = self.slot(dev) {
            slot.status.store(status, Ordering::Release);
        }
    }

    /// 记录最近一个发来状态包的设备
    pub fn store_last_device_received(&self, dev: DeviceId) {
        let dev = i32::try_from(dev).unwrap_or(-1);
        self.last_device_received.store(dev, Ordering::Release);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("devices", &self.slots.len())
            .field("last_device_received", &self.last_device_received())
            .finish()
    }
}
