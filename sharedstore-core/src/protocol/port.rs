/*
    Port - one end of a bidirectional message channel between two contexts.

    Built from a pair of unbounded tokio mpsc channels:
    - post_message never blocks and never waits for the receiver
    - delivery is FIFO per direction
    - payloads are structured JSON values, so protocol envelopes and
      application messages travel on the same channel

    Exactly one event loop drains a port's receiving half. Everything else
    only holds a `PortSender`.
*/

use serde_json::Value;
use tokio::sync::mpsc;

use super::envelope::Envelope;
use super::error::ChannelError;

/// Sending half of a port, cheap to clone
#[derive(Debug, Clone)]
pub struct PortSender {
    tx: mpsc::UnboundedSender<Value>,
}

impl PortSender {
    /// Post a raw payload to the other end
    pub fn post_message(&self, data: Value) -> Result<(), ChannelError> {
        self.tx.send(data).map_err(|_| ChannelError::Disconnected)
    }

    /// Post a protocol envelope to the other end
    pub fn post_envelope(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        self.post_message(envelope.to_value()?)
    }

    /// True once the other end's receiver has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One end of a channel
#[derive(Debug)]
pub struct MessagePort {
    sender: PortSender,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl MessagePort {
    /// Create two connected ports
    ///
    /// Whatever is posted on one is received by the other.
    pub fn pair() -> (MessagePort, MessagePort) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        (
            MessagePort {
                sender: PortSender { tx: b_tx },
                rx: a_rx,
            },
            MessagePort {
                sender: PortSender { tx: a_tx },
                rx: b_rx,
            },
        )
    }

    pub fn post_message(&self, data: Value) -> Result<(), ChannelError> {
        self.sender.post_message(data)
    }

    pub fn sender(&self) -> PortSender {
        self.sender.clone()
    }

    /// Receive the next payload, `None` once the other end is gone
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Receive a payload if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    /// Split into the sending half and the raw receiver
    pub fn split(self) -> (PortSender, mpsc::UnboundedReceiver<Value>) {
        (self.sender, self.rx)
    }
}
