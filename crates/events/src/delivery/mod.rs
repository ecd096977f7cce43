//! External delivery channels for lifecycle notifications.

pub mod webhook;
