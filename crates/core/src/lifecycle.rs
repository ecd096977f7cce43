//! Lifecycle topics and webhook registration requests.
//!
//! A topic names one event on one resource: `<kind>:<id>:<event>`, for
//! example `experiments:17:started`. The event bus is generic over topic
//! strings; webhook registration restricts callers to the kinds and events
//! workers actually report.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Resource kinds and events
// ---------------------------------------------------------------------------

/// Resource kinds that publish lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Experiments,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "experiments" => Some(Self::Experiments),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
        }
    }
}

/// Lifecycle events reported by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Started,
    Finished,
}

impl LifecycleEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
        }
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// Subscription key for the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Build a topic from arbitrary kind, id and event names.
    pub fn new(kind: &str, resource_id: &str, event: &str) -> Self {
        Self(format!("{kind}:{resource_id}:{event}"))
    }

    /// Topic for a lifecycle event on a known resource kind.
    pub fn lifecycle(kind: ResourceKind, resource_id: impl fmt::Display, event: LifecycleEvent) -> Self {
        Self::new(kind.name(), &resource_id.to_string(), event.name())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Webhook registration
// ---------------------------------------------------------------------------

/// Body of a webhook registration request.
///
/// Every field is optional on the wire so that missing values produce the
/// same validation errors as malformed ones.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookRegistration {
    /// Callback URL that receives one POST when the event fires.
    #[validate(url)]
    pub url: Option<String>,
    /// Resource kind, currently only `experiments`.
    pub objects: Option<String>,
    /// `started` or `finished`.
    pub event: Option<String>,
    /// Identity of the watched resource (string or number).
    pub object_id: Option<serde_json::Value>,
}

/// A registration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub topic: Topic,
}

impl WebhookRegistration {
    /// Validate the registration and resolve its topic.
    ///
    /// Checks run in order: URL, resource kind, event name, resource id.
    pub fn resolve(&self) -> Result<WebhookTarget, CoreError> {
        let url = match self.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() && self.validate().is_ok() && is_http_url(u) => u,
            _ => return Err(CoreError::Validation("Invalid or empty URL".into())),
        };

        let kind = self
            .objects
            .as_deref()
            .and_then(ResourceKind::parse)
            .ok_or_else(|| CoreError::Validation("Object is not 'experiments'".into()))?;

        let event = self
            .event
            .as_deref()
            .and_then(LifecycleEvent::parse)
            .ok_or_else(|| {
                CoreError::Validation("Event is not 'started' or 'finished'".into())
            })?;

        let resource_id = match &self.object_id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(CoreError::Validation("No object ID provided".into())),
        };

        Ok(WebhookTarget {
            url: url.to_string(),
            topic: Topic::lifecycle(kind, resource_id, event),
        })
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(v: serde_json::Value) -> WebhookRegistration {
        serde_json::from_value(v).unwrap()
    }

    fn error_of(v: serde_json::Value) -> String {
        match registration(v).resolve() {
            Err(CoreError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn topic_format() {
        let t = Topic::lifecycle(ResourceKind::Experiments, "e1", LifecycleEvent::Started);
        assert_eq!(t.as_str(), "experiments:e1:started");
        assert_eq!(Topic::new("batches", "4", "closed").to_string(), "batches:4:closed");
    }

    #[test]
    fn numeric_and_string_ids_share_a_topic() {
        let a = registration(json!({
            "url": "http://hooks.local/cb", "objects": "experiments",
            "event": "finished", "object_id": 17
        }))
        .resolve()
        .unwrap();
        let b = registration(json!({
            "url": "http://hooks.local/cb", "objects": "experiments",
            "event": "finished", "object_id": "17"
        }))
        .resolve()
        .unwrap();
        assert_eq!(a.topic, b.topic);
        assert_eq!(a.topic, Topic::lifecycle(ResourceKind::Experiments, 17, LifecycleEvent::Finished));
    }

    #[test]
    fn valid_registration_resolves() {
        let target = registration(json!({
            "url": "https://example.com/hook",
            "objects": "experiments",
            "event": "started",
            "object_id": "e1"
        }))
        .resolve()
        .unwrap();
        assert_eq!(target.url, "https://example.com/hook");
        assert_eq!(target.topic.as_str(), "experiments:e1:started");
    }

    #[test]
    fn missing_or_malformed_url_rejected() {
        assert_eq!(error_of(json!({"objects": "experiments"})), "Invalid or empty URL");
        assert_eq!(error_of(json!({"url": ""})), "Invalid or empty URL");
        assert_eq!(error_of(json!({"url": "not a url"})), "Invalid or empty URL");
        assert_eq!(error_of(json!({"url": "ftp://files.local/x"})), "Invalid or empty URL");
    }

    #[test]
    fn unknown_kind_rejected() {
        assert_eq!(
            error_of(json!({"url": "http://h.local/x", "objects": "machines"})),
            "Object is not 'experiments'"
        );
    }

    #[test]
    fn unknown_event_rejected() {
        assert_eq!(
            error_of(json!({"url": "http://h.local/x", "objects": "experiments", "event": "paused"})),
            "Event is not 'started' or 'finished'"
        );
    }

    #[test]
    fn missing_id_rejected() {
        assert_eq!(
            error_of(json!({"url": "http://h.local/x", "objects": "experiments", "event": "started"})),
            "No object ID provided"
        );
        assert_eq!(
            error_of(json!({
                "url": "http://h.local/x", "objects": "experiments",
                "event": "started", "object_id": "  "
            })),
            "No object ID provided"
        );
    }
}
