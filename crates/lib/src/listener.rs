//! Inbound pump: raw frames from the host, in delivery order, into the bridge.

use crate::client::Bridge;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Dispatch every frame received on `rx` until the sender side closes.
pub async fn run_listener(bridge: Bridge, mut rx: mpsc::Receiver<String>) {
    while let Some(raw) = rx.recv().await {
        bridge.handle_message(&raw);
    }
    log::info!("inbound channel closed; listener stopped");
}

/// Start `run_listener` on the current runtime.
pub fn spawn_listener(bridge: Bridge, rx: mpsc::Receiver<String>) -> JoinHandle<()> {
    tokio::spawn(run_listener(bridge, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn frames_are_dispatched_in_order() {
        let (t, _out) = ChannelTransport::new();
        let bridge = Bridge::new(Arc::new(t));
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_listener(bridge.clone(), rx);

        tx.send(r#"{"eventType":"init","data":{"extensionData":"a"}}"#.to_string())
            .await
            .unwrap();
        tx.send("garbage".to_string()).await.unwrap();
        tx.send(r#"{"eventType":"extensionDataChanged","data":{"data":"b"}}"#.to_string())
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(bridge.extension_data().as_deref(), Some("b"));
    }
}
