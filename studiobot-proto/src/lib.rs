//! `StudioBot` shared data model and wire protocol.
//!
//! The task and member collections live in a keyed JSON document store and
//! reach the bot either as full-value snapshots (subscriptions) or one-shot
//! reads. This crate owns the model types, the normalization of the store's
//! array-vs-map serialization duality, and the JSON codec for the gateway
//! WebSocket protocol.

pub mod event;
pub mod gateway;
pub mod member;
pub mod task;
