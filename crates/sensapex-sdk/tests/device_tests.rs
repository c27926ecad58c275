//! 设备句柄集成测试

use crossbeam_channel::unbounded;
use sensapex_sdk::prelude::*;
use sensapex_transport::RequestKind;
use sensapex_transport::mock::{MockBus, MockConnector, MockDevice};
use std::sync::Arc;
use std::time::Duration;

fn open(bus: &MockBus, start_poller: bool) -> Arc<Session> {
    let config = SessionConfig {
        start_poller,
        poller: PollerConfig {
            interval_ms: 5,
            position_timeout_ms: 20,
            error_backoff_ms: 50,
        },
        ..SessionConfig::default()
    };
    Session::open_with(MockConnector::new(bus.clone()), config).unwrap()
}

#[test]
fn test_operations_use_own_id() {
    let bus = MockBus::new();
    bus.add_device(1, MockDevice::new(3, [0; 4]));
    bus.add_device(2, MockDevice::new(4, [0; 4]));
    let session = open(&bus, false);
    let device = Device::new(&session, 2);

    device
        .goto_position(&[10, 20, 30, 40], 100.0, MoveOptions::default().blocking(true))
        .unwrap();
    assert_eq!(bus.device(2).unwrap().position, [10, 20, 30, 40]);
    assert_eq!(bus.device(1).unwrap().position, [0; 4]);
    assert_eq!(device.position(None).unwrap().as_slice(), &[10, 20, 30, 40]);
    assert!(!device.is_busy().unwrap());

    device.select().unwrap();
    assert_eq!(bus.cu_selected(), Some(2));
    device.set_active(true).unwrap();
    assert!(bus.device(2).unwrap().cu_active);

    device.set_pressure(1, 42).unwrap();
    assert_eq!(device.pressure(1).unwrap(), 42);
    device.set_valve(1, 1).unwrap();
    assert_eq!(device.valve(1).unwrap(), 1);
    device.set_custom_slow_speed(true).unwrap();
    assert!(device.custom_slow_speed().unwrap());

    device.stop().unwrap();
    assert_eq!(bus.call_count(RequestKind::Stop), 1);
}

#[test]
fn test_axis_count_override() {
    let bus = MockBus::new();
    bus.add_device(5, MockDevice::new(4, [1, 2, 3, 4]));
    bus.fail_next(RequestKind::GetAxisCount, -4);
    let session = open(&bus, false);

    let device = Device::with_axis_count(&session, 5, 3).unwrap();
    assert_eq!(device.axis_count().unwrap(), 3);
    assert_eq!(device.position(None).unwrap().as_slice(), &[1, 2, 3]);
    assert_eq!(bus.call_count(RequestKind::GetAxisCount), 0);

    // 同一会话上的其他句柄共享覆盖值
    let other = Device::new(&session, 5);
    assert_eq!(other.axis_count().unwrap(), 3);
}

#[test]
fn test_operations_fail_after_session_dropped() {
    let bus = MockBus::new();
    bus.add_device(1, MockDevice::new(3, [0; 4]));
    let session = open(&bus, false);
    let device = Device::new(&session, 1);

    drop(session);
    assert_eq!(bus.close_count(), 1);
    assert!(matches!(device.position(Some(0)), Err(DriverError::NotOpen)));
    assert!(matches!(device.stop(), Err(DriverError::NotOpen)));
    assert!(matches!(
        device.set_change_callback(|_, _, _| {}),
        Err(DriverError::NotOpen)
    ));
}

#[test]
fn test_change_callback() {
    let bus = MockBus::new();
    bus.add_device(1, MockDevice::new(3, [0; 4]));
    let session = open(&bus, true);
    let device = Device::new(&session, 1);

    let (tx, rx) = unbounded();
    device
        .set_change_callback(move |dev, new, old| {
            let _ = tx.send((dev, new.to_vec(), old.map(|o| o.to_vec())));
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().0, 1);

    device
        .goto_position(&[0, 0, 5], 100.0, MoveOptions::default())
        .unwrap();
    let (_, new, old) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(new, vec![0, 0, 5]);
    assert_eq!(old, Some(vec![0, 0, 0]));
}

#[test]
fn test_change_callback_replaced_and_cleared() {
    let bus = MockBus::new();
    bus.add_device(1, MockDevice::new(3, [0; 4]));
    let session = open(&bus, false);
    let device = Device::new(&session, 1);
    let other = Device::new(&session, 1);

    device.set_change_callback(|_, _, _| {}).unwrap();
    device.set_change_callback(|_, _, _| {}).unwrap();
    other.set_change_callback(|_, _, _| {}).unwrap();
    assert_eq!(session.observer_count(1), 2);

    assert!(device.clear_change_callback());
    assert!(!device.clear_change_callback());
    assert_eq!(session.observer_count(1), 1);

    // 释放句柄时移除其回调
    drop(other);
    assert_eq!(session.observer_count(1), 0);
}
