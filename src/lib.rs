//! # hubsub
//!
//! `hubsub` is a best-effort, in-memory publish/subscribe broker built with
//! Rust and tokio. Clients connect over TCP (one JSON object per line) or
//! WebSocket, subscribe to a named topic, or publish a JSON object that the
//! broker fans out to every current subscriber of that topic.
//!
//! ## Core Modules
//!
//! - `broker`: the topic registry, the fan-out path and the accept loops.
//! - `client`: the broker-side connection handle and a small protocol client.
//! - `config`: loading and merging settings from files and environment.
//! - `transport`: the wire protocol, the per-connection handler and the TCP
//!   and WebSocket transports.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
