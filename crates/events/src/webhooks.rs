//! Webhook registrations bound to the event bus.

use std::sync::Arc;

use labcoord_core::lifecycle::WebhookTarget;

use crate::bus::EventBus;
use crate::delivery::webhook::WebhookDelivery;

/// Registers webhooks as one-shot bus subscriptions.
///
/// When the registered topic fires, the registration body is POSTed to the
/// callback URL on a spawned task. Failures are logged at `debug` and
/// otherwise dropped.
#[derive(Clone)]
pub struct WebhookRegistry {
    bus: Arc<EventBus>,
    delivery: Arc<WebhookDelivery>,
}

impl WebhookRegistry {
    pub fn new(bus: Arc<EventBus>, delivery: Arc<WebhookDelivery>) -> Self {
        Self { bus, delivery }
    }

    /// Register `target`; `body` is what the callback URL will receive.
    pub fn register(&self, target: WebhookTarget, body: serde_json::Value) {
        let delivery = Arc::clone(&self.delivery);
        let WebhookTarget { url, topic } = target;
        tracing::debug!(%topic, url = %url, "Webhook registered");

        self.bus.subscribe_once(topic, move |notice| {
            let topic = notice.topic.clone();
            tokio::spawn(async move {
                match delivery.deliver(&url, &body).await {
                    Ok(()) => tracing::debug!(%topic, url = %url, "Webhook delivered"),
                    Err(e) => {
                        tracing::debug!(%topic, url = %url, error = %e, "Webhook delivery failed")
                    }
                }
            });
        });
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
