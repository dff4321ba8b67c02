//! Transport Integration Tests
//!
//! Drives the push client against a local hub that speaks just enough of
//! the JSON hub protocol.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use icm_console::transport::protocol::{handshake_request, RECORD_SEPARATOR};
use icm_console::transport::{ConnectionState, TransportClient, TransportEvent, TransportSettings};

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("transport went quiet")
        .expect("transport channel closed")
}

#[tokio::test]
async fn test_connects_delivers_and_reports_loss() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let hub = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let handshake = ws.next().await.unwrap().unwrap();
        assert_eq!(handshake.into_text().unwrap(), handshake_request());

        ws.send(Message::Text(format!("{{}}{RECORD_SEPARATOR}")))
            .await
            .unwrap();
        ws.send(Message::Text(format!(
            r#"{{"type":6}}{sep}{{"type":1,"target":"ProcessStepUpdate","arguments":[{{"stepId":"calculating","status":"in_progress"}}]}}{sep}"#,
            sep = RECORD_SEPARATOR
        )))
        .await
        .unwrap();

        // Drop the connection and stop listening
        ws.close(None).await.ok();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let settings = TransportSettings::new(format!("ws://127.0.0.1:{port}/hubs/notifications"));
    let handle = TransportClient::new(settings, tx).spawn();

    assert_eq!(next_event(&mut rx).await, TransportEvent::State(ConnectionState::Connecting));
    assert_eq!(next_event(&mut rx).await, TransportEvent::State(ConnectionState::Connected));

    match next_event(&mut rx).await {
        TransportEvent::Message(message) => {
            assert_eq!(message.name, "ProcessStepUpdate");
            assert_eq!(message.payload["stepId"], "calculating");
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(next_event(&mut rx).await, TransportEvent::State(ConnectionState::Reconnecting));

    hub.await.unwrap();
    handle.stop().await.unwrap();
}
