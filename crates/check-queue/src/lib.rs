//! Client for the remote work-queue service.
//!
//! Speaks the claim/complete/release protocol over JSON HTTP with an
//! API key and a stable instance identity. Every method except
//! [`QueueClient::release_instance`] absorbs failures into a safe
//! default so the worker keeps running through queue outages.

mod client;

pub use client::{QueueClient, QueueError, WorkQueue, QUEUE_NAME};
