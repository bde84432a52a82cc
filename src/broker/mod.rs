//! The `broker` module is the core of the system: the shared topic registry,
//! the fan-out path and the listener that ties connections to both.

pub mod engine;
pub mod publish;
pub mod registry;

pub use engine::Broker;
pub use publish::{Delivery, publish};
pub use registry::TopicRegistry;
