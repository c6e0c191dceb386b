//! Channel adapter
//!
//! Sits between a port's inbound half and the listeners interested in it.
//! The protocol listener always sees a payload first. Tagged payloads stop
//! there; everything else is rebroadcast to application listeners with a
//! tokio broadcast channel, so any number of them can subscribe.

use metrics::counter;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::envelope::Envelope;
use crate::metrics::{MESSAGES_PASSTHROUGH, MESSAGES_PROTOCOL};

/// Outcome of delivering one inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Tagged and well formed, to be dispatched by the protocol handler
    Protocol(Envelope),
    /// Tagged but malformed; dropped
    Dropped,
    /// Not protocol traffic; handed to application listeners
    Passthrough {
        /// Number of application listeners that received it
        listeners: usize,
    },
}

/// Listener fan-out for a single channel
#[derive(Debug, Clone)]
pub struct ChannelAdapter {
    listeners: broadcast::Sender<Value>,
}

impl ChannelAdapter {
    /// Create an adapter
    ///
    /// # Arguments
    /// * `capacity` - payloads buffered per application listener
    pub fn new(capacity: usize) -> Self {
        let (listeners, _rx) = broadcast::channel(capacity.max(1));
        Self { listeners }
    }

    /// Subscribe an application listener
    ///
    /// Only payloads delivered after subscribing are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.listeners.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.receiver_count()
    }

    /// Deliver one inbound payload
    pub fn deliver(&self, data: Value) -> Delivery {
        if !Envelope::is_tagged(&data) {
            counter!(MESSAGES_PASSTHROUGH).increment(1);
            // No listeners is not an error, the payload is just unobserved.
            let listeners = self.listeners.send(data).unwrap_or(0);
            trace!(listeners, "Passed non-protocol message to application listeners");
            return Delivery::Passthrough { listeners };
        }

        counter!(MESSAGES_PROTOCOL).increment(1);
        match Envelope::from_value(data) {
            Ok(envelope) => Delivery::Protocol(envelope),
            Err(e) => {
                debug!(error = %e, "Dropping malformed protocol message");
                Delivery::Dropped
            }
        }
    }
}

impl Default for ChannelAdapter {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::API_TAG;
    use serde_json::json;

    #[tokio::test]
    async fn test_protocol_message_is_not_propagated() {
        let adapter = ChannelAdapter::new(8);
        let mut app = adapter.subscribe();

        let envelope = Envelope::set_item("k", json!("v"));
        let delivery = adapter.deliver(envelope.to_value().unwrap());

        assert_eq!(delivery, Delivery::Protocol(envelope));
        assert!(app.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_foreign_message_reaches_every_listener() {
        let adapter = ChannelAdapter::new(8);
        let mut first = adapter.subscribe();
        let mut second = adapter.subscribe();

        let payload = json!({ "tag": "not-ours", "hello": "world" });
        let delivery = adapter.deliver(payload.clone());

        assert_eq!(delivery, Delivery::Passthrough { listeners: 2 });
        assert_eq!(first.recv().await.unwrap(), payload);
        assert_eq!(second.recv().await.unwrap(), payload);
    }

    #[test]
    fn test_passthrough_without_listeners() {
        let adapter = ChannelAdapter::default();
        assert_eq!(
            adapter.deliver(json!([1, 2, 3])),
            Delivery::Passthrough { listeners: 0 }
        );
    }

    #[test]
    fn test_malformed_tagged_message_is_dropped() {
        let adapter = ChannelAdapter::new(8);
        let mut app = adapter.subscribe();

        let delivery = adapter.deliver(json!({ "tag": API_TAG, "arguments": "nope" }));

        assert_eq!(delivery, Delivery::Dropped);
        assert!(app.try_recv().is_err());
    }

    #[test]
    fn test_unknown_operation_still_counts_as_protocol() {
        let adapter = ChannelAdapter::new(8);
        let delivery = adapter.deliver(json!({
            "tag": API_TAG,
            "operation": "somethingNew",
            "arguments": []
        }));

        match delivery {
            Delivery::Protocol(envelope) => assert_eq!(envelope.operation, "somethingNew"),
            other => panic!("unexpected delivery: {:?}", other),
        }
    }
}
