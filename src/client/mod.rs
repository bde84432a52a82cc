//! The `client` module covers both ends of a connection.
//!
//! [`ClientHandle`] is the broker-side representation of a connected client:
//! its identity and the queue through which payloads reach it.
//! [`PubSubClient`] is the small protocol client used to talk to a broker
//! from the outside.

pub mod handle;
pub mod pubsub_client;

pub use handle::{ClientHandle, ClientId};
pub use pubsub_client::{PubSubClient, Subscription};

#[cfg(test)]
mod tests;
