//! Outbound transport: the one call that carries an envelope to the host.

use crate::protocol::Envelope;
use tokio::sync::mpsc;

/// Posts an envelope to the host at `target_origin`. Fire-and-forget: answers arrive as inbound events.
pub trait Transport: Send + Sync {
    fn post_message(&self, envelope: Envelope, target_origin: &str) -> Result<(), String>;
}

/// Envelope plus the origin it was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub envelope: Envelope,
    pub target_origin: String,
}

/// Transport that forwards frames to an unbounded tokio channel (e.g. a WebSocket writer task).
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn post_message(&self, envelope: Envelope, target_origin: &str) -> Result<(), String> {
        self.tx
            .send(OutboundFrame {
                envelope,
                target_origin: target_origin.to_string(),
            })
            .map_err(|_| "outbound channel closed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forwards_frame_with_origin() {
        let (t, mut rx) = ChannelTransport::new();
        t.post_message(Envelope::new("sendOnClose", json!({})), "https://host.example")
            .unwrap();
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.envelope.event_type, "sendOnClose");
        assert_eq!(frame.target_origin, "https://host.example");
    }

    #[test]
    fn closed_receiver_is_an_error() {
        let (t, rx) = ChannelTransport::new();
        drop(rx);
        let err = t
            .post_message(Envelope::new("sendOnClose", json!({})), "https://host.example")
            .unwrap_err();
        assert_eq!(err, "outbound channel closed");
    }
}
