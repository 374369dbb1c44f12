//! The `client` module defines the representation of a connected client in
//! the broker.
//!
//! It provides the `Client` struct, which encapsulates the state of a single
//! accepted connection (id, outbound channel, registration, sent-log), and
//! the write-once `Registration` state machine.

pub mod pubsub_client;
pub mod registration;

pub use pubsub_client::Client;
pub use registration::{Registration, Role};

#[cfg(test)]
mod tests;
