use crate::domain::ReadingIngestionService;
use crate::nats::reading_message::ReadingMessage;
use chrono::{DateTime, Utc};
use common::domain::Reading;
use common::nats::{BatchProcessor, ProcessingResult};
use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Batch split into decodable readings and rejected message indices
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub readings: Vec<(usize, Reading)>,
    pub rejected: Vec<(usize, Option<String>)>,
}

/// Decode `(subject, payload)` pairs into readings, remembering each message index
pub fn decode_batch<'a, I>(messages: I, received_at: DateTime<Utc>) -> DecodedBatch
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut batch = DecodedBatch::default();

    for (index, (subject, payload)) in messages.into_iter().enumerate() {
        match ReadingMessage::from_json(payload)
            .and_then(|message| message.into_reading(subject, received_at))
        {
            Ok(reading) => batch.readings.push((index, reading)),
            Err(e) => {
                warn!(message_index = index, subject = %subject, error = %e, "Failed to decode reading");
                batch.rejected.push((index, Some(e.to_string())));
            }
        }
    }

    batch
}

/// Ingest a decoded batch. Readings of one device run in arrival order;
/// devices run concurrently.
pub async fn process_decoded_batch(
    service: &ReadingIngestionService,
    batch: DecodedBatch,
) -> ProcessingResult {
    let mut by_device: HashMap<String, Vec<(usize, Reading)>> = HashMap::new();
    for (index, reading) in batch.readings {
        by_device
            .entry(reading.device_id.clone())
            .or_default()
            .push((index, reading));
    }

    debug!(device_count = by_device.len(), "Processing reading batch");

    let per_device = join_all(by_device.into_values().map(|readings| async move {
        let mut ack = Vec::new();
        let mut nak = Vec::new();
        for (index, reading) in readings {
            match service.ingest_reading(reading).await {
                Ok(_) => ack.push(index),
                Err(e) => {
                    error!(message_index = index, error = %e, "Failed to ingest reading");
                    nak.push((index, Some(format!("Storage error: {}", e))));
                }
            }
        }
        (ack, nak)
    }))
    .await;

    let mut result = ProcessingResult::new(Vec::new(), batch.rejected);
    for (ack, nak) in per_device {
        result.ack.extend(ack);
        result.nak.extend(nak);
    }
    result.ack.sort_unstable();
    result.nak.sort_by_key(|(index, _)| *index);
    result
}

/// Batch processor for the sensor readings stream
pub fn create_reading_processor(service: Arc<ReadingIngestionService>) -> BatchProcessor {
    Box::new(move |messages: &[async_nats::jetstream::Message]| {
        let service = service.clone();

        let batch = decode_batch(
            messages
                .iter()
                .map(|msg| (msg.subject.as_str(), &msg.payload[..])),
            Utc::now(),
        );

        Box::pin(async move {
            if batch.readings.is_empty() {
                debug!("No decodable readings in batch");
                return Ok(ProcessingResult::new(vec![], batch.rejected));
            }
            Ok(process_decoded_batch(&service, batch).await)
        }) as BoxFuture<'static, anyhow::Result<ProcessingResult>>
    })
}
