//! `StudioBot` gateway library.
//!
//! Exposes the gateway server for use in tests and embedding. The gateway
//! serves a keyed JSON document store (full-value change notifications,
//! path-based reads and writes) and a channel-scoped chat surface over a
//! single WebSocket endpoint.

pub mod config;
pub mod gateway;
pub mod store;
