//! linesub broker
//!
//! The broker module contains the shared state of the message broker:
//! the topic registry (message logs and bound connections), the connected
//! clients, the inspect session, and message delivery.
//!
//! Public types:
//! - `Broker`: shared engine used by every connection task and the console.
//! - `Message`: immutable published message.
//! - `TopicRegistry`: topic logs plus the process-wide message id counter.

pub mod engine;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use message::{Delivery, Message};
pub use topic::{ConnectionId, MessageId, TopicName, TopicRegistry, TopicSummary};
