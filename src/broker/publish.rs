//! Fan-out of one published payload to the current subscribers of a topic.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::broker::registry::TopicRegistry;
use crate::transport::message::{self, Payload};

/// Outcome of a single fan-out, for logging and tests. Never reported back
/// to the publisher.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// Delivers `data` to every connection subscribed to `topic` at the moment
/// of the call.
///
/// The payload is encoded once and offered to all subscribers concurrently.
/// A subscriber whose queue stays full for `timeout`, or whose connection
/// is gone, is told to disconnect; the others are still served. The caller
/// is held back until every subscriber has either taken the payload or
/// been dropped.
pub async fn publish(
    registry: &TopicRegistry,
    topic: &str,
    data: &Payload,
    timeout: Duration,
) -> Delivery {
    let subscribers = registry.snapshot(topic);
    let mut delivery = Delivery::default();

    if subscribers.is_empty() {
        debug!(topic, "publish to topic without subscribers");
        return delivery;
    }

    let payload = match message::encode_payload(data) {
        Ok(payload) => payload,
        Err(e) => {
            error!(topic, "failed to encode payload: {e}");
            return delivery;
        }
    };

    let outcomes = join_all(
        subscribers
            .iter()
            .map(|subscriber| subscriber.deliver(payload.clone(), timeout)),
    )
    .await;

    for (subscriber, outcome) in subscribers.iter().zip(outcomes) {
        match outcome {
            Ok(()) => delivery.delivered += 1,
            Err(e) => {
                warn!(client = %subscriber.id(), topic, "dropping subscriber: {e}");
                subscriber.disconnect();
                delivery.dropped += 1;
            }
        }
    }

    debug!(
        topic,
        delivered = delivery.delivered,
        dropped = delivery.dropped,
        "publish fanned out"
    );
    delivery
}
