#![cfg(all(feature = "server", feature = "client"))]

use std::time::Duration;

use dream_relay::{
    Bus, ChannelKey, Config, KIND_DOORBELL, RelayEvent,
    client::{ChannelClient, ConnectionStatus, HttpTransport},
    sse::{AppState, router},
};
use serde_json::json;
use tokio::{net::TcpListener, sync::mpsc};

#[tokio::test]
async fn test_client_receives_events_over_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config::default().with_base_url(format!("http://{addr}"));
    let state = AppState::new(Bus::new(config.clone()), config.clone());
    let bus = state.bus.clone();
    let shutdown = state.shutdown.clone();
    let stop = state.shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = HttpTransport::from_config(&config).unwrap();
    let mut client = ChannelClient::spawn(transport, Some("c1".into()), &config, move |event| {
        let _ = tx.send(event);
    });

    let mut status = client.watch_status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.is_connected()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bus.listener_count(&ChannelKey::cafe("c1")), 1);

    bus.emit(&RelayEvent::cafe("c1", KIND_DOORBELL, json!({ "by": "ana" })));
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, KIND_DOORBELL);
    assert_eq!(event.payload["by"], "ana");

    client.close();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);

    stop.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
