//! Webhook registrations against a local HTTP receiver.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use labcoord_core::lifecycle::{LifecycleEvent, ResourceKind, Topic, WebhookTarget};
use labcoord_events::{EventBus, LifecycleNotice, WebhookDelivery, WebhookRegistry};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Serve a receiver that forwards every POSTed body to the returned channel.
async fn spawn_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route(
            "/hook",
            post(move |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                let _ = tx.send(body);
                status
            }),
        )
        .with_state(tx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), rx)
}

fn registry() -> WebhookRegistry {
    WebhookRegistry::new(
        Arc::new(EventBus::default()),
        Arc::new(WebhookDelivery::new(Duration::from_secs(5))),
    )
}

fn started(id: &str) -> Topic {
    Topic::lifecycle(ResourceKind::Experiments, id, LifecycleEvent::Started)
}

#[tokio::test]
async fn fires_once_with_registration_body() {
    let (url, mut rx) = spawn_receiver(StatusCode::OK).await;
    let registry = registry();
    let body = json!({"url": url, "objects": "experiments", "event": "started", "object_id": "e1"});

    registry.register(WebhookTarget { url: url.clone(), topic: started("e1") }, body.clone());
    assert_eq!(registry.bus().publish(LifecycleNotice::new(started("e1"))), 1);

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("webhook should arrive")
        .unwrap();
    assert_eq!(received, body);

    // Second publish has nothing left to fire.
    assert_eq!(registry.bus().publish(LifecycleNotice::new(started("e1"))), 0);
    let again = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(again.is_err(), "webhook must not fire twice");
}

#[tokio::test]
async fn receiver_errors_are_swallowed() {
    let (url, mut rx) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
    let registry = registry();

    registry.register(WebhookTarget { url: url.clone(), topic: started("e2") }, json!({"n": 1}));
    registry.bus().publish(LifecycleNotice::new(started("e2")));

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(received.is_ok());
    assert_eq!(registry.bus().pending(&started("e2")), 0);
}

#[tokio::test]
async fn unrelated_event_does_not_fire() {
    let (url, mut rx) = spawn_receiver(StatusCode::OK).await;
    let registry = registry();

    registry.register(WebhookTarget { url, topic: started("e3") }, json!({}));
    let finished = Topic::lifecycle(ResourceKind::Experiments, "e3", LifecycleEvent::Finished);
    registry.bus().publish(LifecycleNotice::new(finished));

    let received = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(received.is_err());
    assert_eq!(registry.bus().pending(&started("e3")), 1);
}
