use crate::domain::{DomainResult, ListReadingsInput, Reading, ReadingRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Readings retained per device unless configured otherwise
pub const DEFAULT_MAX_READINGS_PER_DEVICE: usize = 1000;

/// Reading store keyed by device, each device's readings kept sorted by
/// `recorded_at`. Only the newest `max_per_device` readings of a device are retained.
#[derive(Clone)]
pub struct InMemoryReadingRepository {
    readings: Arc<RwLock<HashMap<String, Vec<Reading>>>>,
    max_per_device: usize,
}

impl Default for InMemoryReadingRepository {
    fn default() -> Self {
        Self::with_max_per_device(DEFAULT_MAX_READINGS_PER_DEVICE)
    }
}

impl InMemoryReadingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_per_device(max_per_device: usize) -> Self {
        Self {
            readings: Arc::new(RwLock::new(HashMap::new())),
            max_per_device: max_per_device.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReadingRepository for InMemoryReadingRepository {
    /// Upsert by reading id so redelivered messages do not duplicate readings
    async fn store_reading(&self, reading: Reading) -> DomainResult<()> {
        let mut readings = self.readings.write().await;
        let device_readings = readings.entry(reading.device_id.clone()).or_default();

        device_readings.retain(|r| r.id != reading.id);
        let position = device_readings.partition_point(|r| r.recorded_at <= reading.recorded_at);
        debug!(
            reading_id = %reading.id,
            device_id = %reading.device_id,
            "Stored reading"
        );
        device_readings.insert(position, reading);

        let excess = device_readings.len().saturating_sub(self.max_per_device);
        if excess > 0 {
            device_readings.drain(..excess);
            debug!(dropped = excess, "Evicted oldest readings");
        }
        Ok(())
    }

    async fn list_readings(&self, input: ListReadingsInput) -> DomainResult<Vec<Reading>> {
        let readings = self.readings.read().await;

        // Each device contributes at most `limit` of its newest matching readings
        let mut matched: Vec<Reading> = input
            .device_ids
            .iter()
            .filter_map(|device_id| readings.get(device_id))
            .flat_map(|device_readings| {
                device_readings
                    .iter()
                    .rev()
                    .filter(|r| input.to.map_or(true, |to| r.recorded_at <= to))
                    .take_while(|r| input.from.map_or(true, |from| r.recorded_at >= from))
                    .take(input.limit)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        matched.truncate(input.limit);
        Ok(matched)
    }

    async fn get_latest_reading(&self, device_id: &str) -> DomainResult<Option<Reading>> {
        let readings = self.readings.read().await;
        Ok(readings.get(device_id).and_then(|r| r.last().cloned()))
    }
}
