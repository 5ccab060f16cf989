use async_trait::async_trait;
use parkline_core::{EventPublisher, PublishError, ReservationEvent};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

/// Kafka-backed event publisher. One topic per event kind, keyed by
/// reservation id so per-reservation ordering survives partitioning. The
/// producer retries internally; a delivery failure surfaces as
/// `PublishError` and is logged by the caller, never dropped silently.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    topic,
                    key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "event delivered"
                );
                Ok(())
            }
            Err((err, _msg)) => {
                error!(topic, key, %err, "failed to deliver event");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), PublishError> {
        let payload =
            serde_json::to_string(event).map_err(|err| PublishError(err.to_string()))?;
        let key = event.reservation().id.to_string();
        self.send(event.topic(), &key, &payload)
            .await
            .map_err(|err| PublishError(err.to_string()))
    }
}
