//! 位置变化观察者表
//!
//! 按设备 ID 保存回调列表，由轮询线程在检测到位置变化时触发。
//! 表本身有独立的读写锁：轮询线程每轮先克隆快照再逐个调用，
//! 因此回调内部可以安全地注册/移除观察者，变化在下一轮生效。
//!
//! 闭包不可比较，移除依赖注册时返回的 [`ObserverId`]。

use parking_lot::RwLock;
use sensapex_transport::DeviceId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 位置变化回调：`(设备 ID, 新位置, 旧位置)`
///
/// 第一次观察到位置时旧位置为 `None`。回调在轮询线程上执行，应尽快返回。
pub type PositionCallback = dyn Fn(DeviceId, &[i32], Option<&[i32]>) + Send + Sync + 'static;

/// 观察者注册令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// 某个设备的观察者快照
pub type ObserverSnapshot = Vec<(DeviceId, Vec<Arc<PositionCallback>>)>;

/// 观察者表
#[derive(Default)]
pub struct ObserverTable {
    entries: RwLock<BTreeMap<DeviceId, Vec<(ObserverId, Arc<PositionCallback>)>>>,
    next_id: AtomicU64,
}

impl ObserverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为设备追加一个回调（同一设备的回调按注册顺序触发）
    pub fn add(&self, dev: DeviceId, callback: Arc<PositionCallback>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().entry(dev).or_default().push((id, callback));
        id
    }

    /// 移除一个回调，返回是否找到
    ///
    /// 设备的最后一个回调被移除后，该设备不再被轮询。
    pub fn remove(&self, dev: DeviceId, id: ObserverId) -> bool {
        let mut entries = self.entries.write();
        let Some(list) = entries.get_mut(&dev) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            entries.remove(&dev);
        }
        removed
    }

    /// 克隆当前的观察者表（只包含至少有一个回调的设备）
    pub fn snapshot(&self) -> ObserverSnapshot {
        self.entries
            .read()
            .iter()
            .map(|(dev, list)| (*dev, list.iter().map(|(_, cb)| cb.clone()).collect()))
            .collect()
    }

    /// 某个设备的回调数量
    pub fn count(&self, dev: DeviceId) -> usize {
        self.entries.read().get(&dev).map_or(0, Vec::len)
    }

    /// 被观察的设备数量
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop() -> Arc<PositionCallback> {
        Arc::new(|_, _, _| {})
    }

    #[test]
    fn test_add_and_remove() {
        let table = ObserverTable::new();
        assert!(table.is_empty());

        let a = table.add(1, noop());
        let b = table.add(1, noop());
        let c = table.add(2, noop());
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.count(1), 2);

        assert!(table.remove(1, a));
        assert!(!table.remove(1, a));
        // 令牌属于另一个设备
        assert!(!table.remove(1, c));
        assert_eq!(table.count(1), 1);

        assert!(table.remove(1, b));
        assert_eq!(table.count(1), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let table = ObserverTable::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = order.clone();
            table.add(5, Arc::new(move |_, _, _| order.lock().push(tag)));
        }

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 1);
        let (dev, callbacks) = &snapshot[0];
        assert_eq!(*dev, 5);
        for cb in callbacks {
            cb(5, &[0, 0, 0], None);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_mutation_during_iteration() {
        // 回调内部注册新回调不会死锁，新回调只出现在下一次快照中
        let table = Arc::new(ObserverTable::new());
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let table = table.clone();
            let calls = calls.clone();
            table.clone().add(
                1,
                Arc::new(move |_, _, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    table.add(1, Arc::new(|_, _, _| {}));
                }),
            );
        }

        let snapshot = table.snapshot();
        for (_, callbacks) in &snapshot {
            for cb in callbacks {
                cb(1, &[1, 2, 3], None);
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.count(1), 2);
    }

    #[test]
    fn test_clear() {
        let table = ObserverTable::new();
        table.add(1, noop());
        table.add(3, noop());
        table.clear();
        assert!(table.is_empty());
        assert!(table.snapshot().is_empty());
    }
}
