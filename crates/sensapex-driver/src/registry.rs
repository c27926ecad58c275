//! 会话注册表
//!
//! 保证每个 `(address, group)` 只有一个打开的会话。

use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::session::Session;
use parking_lot::Mutex;
use sensapex_transport::Connector;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type SessionKey = (String, i32);

/// 按 `(address, group)` 复用会话
pub struct SessionRegistry<C: Connector + 'static> {
    connector: Arc<C>,
    sessions: Mutex<HashMap<SessionKey, Arc<Session>>>,
}

impl<C: Connector + 'static> SessionRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 返回 `(config.address, config.group)` 上打开的会话，没有时按配置打开一个
    ///
    /// 已关闭的会话会被替换。
    pub fn get_or_open(&self, config: SessionConfig) -> Result<Arc<Session>, DriverError> {
        let key = (config.address.clone(), config.group);
        let mut sessions = self.sessions.lock();

        if let Some(session) = sessions.get(&key)
            && session.is_open()
        {
            return Ok(session.clone());
        }

        let session = Session::open_with(self.connector.clone(), config)?;
        debug!("Registered session for {}:{}", key.0, key.1);
        sessions.insert(key, session.clone());
        Ok(session)
    }

    /// 查找已打开的会话
    pub fn get(&self, address: &str, group: i32) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .get(&(address.to_string(), group))
            .filter(|session| session.is_open())
            .cloned()
    }

    /// 关闭并移除会话，返回是否存在
    pub fn close(&self, address: &str, group: i32) -> bool {
        let removed = self.sessions.lock().remove(&(address.to_string(), group));
        match removed {
            Some(session) => {
                session.close();
                true
            },
            None => false,
        }
    }

    pub fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl<C: Connector + 'static> Drop for SessionRegistry<C> {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensapex_transport::mock::{MockBus, MockConnector};

    fn config(address: &str, group: i32) -> SessionConfig {
        SessionConfig {
            start_poller: false,
            ..SessionConfig::new(address, group)
        }
    }

    #[test]
    fn test_one_session_per_endpoint() {
        let bus = MockBus::new();
        let registry = SessionRegistry::new(MockConnector::new(bus.clone()));

        let a = registry.get_or_open(config("169.254.255.255", 0)).unwrap();
        let b = registry.get_or_open(config("169.254.255.255", 0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(bus.open_count(), 1);

        let c = registry.get_or_open(config("169.254.255.255", 1)).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("169.254.255.255", 1).is_some());
        assert!(registry.get("10.0.0.255", 0).is_none());
    }

    #[test]
    fn test_closed_session_is_replaced() {
        let bus = MockBus::new();
        let registry = SessionRegistry::new(MockConnector::new(bus.clone()));

        let first = registry.get_or_open(config("169.254.255.255", 0)).unwrap();
        first.close();
        assert!(registry.get("169.254.255.255", 0).is_none());

        let second = registry.get_or_open(config("169.254.255.255", 0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_open());
        assert_eq!(bus.open_count(), 2);
    }

    #[test]
    fn test_close_and_drop() {
        let bus = MockBus::new();
        let registry = SessionRegistry::new(MockConnector::new(bus.clone()));
        let session = registry.get_or_open(config("169.254.255.255", 0)).unwrap();
        registry.get_or_open(config("169.254.255.255", 2)).unwrap();

        assert!(registry.close("169.254.255.255", 0));
        assert!(!registry.close("169.254.255.255", 0));
        assert!(!session.is_open());

        drop(registry);
        assert_eq!(bus.close_count(), 2);
    }
}
