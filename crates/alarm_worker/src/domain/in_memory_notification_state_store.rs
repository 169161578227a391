use async_trait::async_trait;
use common::domain::{DeviceNotificationState, DomainResult, NotificationStateStore};
use dashmap::DashMap;

/// Process-local notification state, one entry per device.
///
/// Entries are never evicted; the map is bounded by fleet size. A multi-instance
/// deployment needs a shared store behind the same trait.
#[derive(Default)]
pub struct InMemoryNotificationStateStore {
    states: DashMap<String, DeviceNotificationState>,
}

impl InMemoryNotificationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl NotificationStateStore for InMemoryNotificationStateStore {
    async fn get(&self, device_id: &str) -> DomainResult<Option<DeviceNotificationState>> {
        Ok(self.states.get(device_id).map(|entry| *entry.value()))
    }

    async fn put(&self, device_id: String, state: DeviceNotificationState) -> DomainResult<()> {
        self.states.insert(device_id, state);
        Ok(())
    }
}
