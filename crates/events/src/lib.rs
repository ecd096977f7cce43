//! Event notification fabric for the lab coordinator.
//!
//! - [`EventBus`]: process-wide one-shot topic table, plus a broadcast feed
//!   of every published [`LifecycleNotice`].
//! - [`WebhookRegistry`]: binds a callback URL to a topic so that the next
//!   publish on that topic triggers one delivery.
//! - [`delivery`]: the outbound HTTP channel.

pub mod bus;
pub mod delivery;
pub mod webhooks;

pub use bus::{EventBus, LifecycleNotice};
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use webhooks::WebhookRegistry;
