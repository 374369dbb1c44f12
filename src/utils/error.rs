//! The `error` module defines the error types used within the `linesub`
//! application.
//!
//! Errors are split by who receives them:
//!
//! - `ProtocolError`: reported to the originating connection; never fatal.
//! - `AdminError`: reported to the operator console; never changes state.
//! - `BrokerError`: process-level failures (configuration, binding).

use crate::broker::topic::{ConnectionId, MessageId};
use thiserror::Error;

/// Errors caused by a single connection's input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Usage: {command} <topic>")]
    MissingTopic { command: &'static str },

    #[error("Usage: send <message>")]
    EmptyBody,

    #[error("Unknown command '{0}'. Register first with 'publish <topic>' or 'subscribe <topic>'")]
    NotRegistered(String),

    #[error("Already registered as {role} on topic '{topic}'")]
    AlreadyRegistered { role: String, topic: String },

    #[error("Command '{command}' is only available to publishers")]
    PublisherOnly { command: String },

    #[error("Subscribers cannot send messages")]
    SubscriberCannotSend,

    #[error("Unknown command '{0}'. Enter 'help' to see the list of available commands")]
    UnknownCommand(String),
}

/// Errors reported to the operator console.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command '{0}'. Enter 'help' to see the list of available commands")]
    UnknownCommand(String),

    #[error("Topic '{0}' does not exist")]
    TopicNotFound(String),

    #[error("Message with ID {0} not found")]
    MessageNotFound(MessageId),

    #[error("User ID {0} not found")]
    UserNotFound(ConnectionId),

    #[error("Command '{0}' is not available in inspect mode")]
    InspectActive(&'static str),

    #[error("Command '{0}' is only available in inspect mode")]
    InspectInactive(&'static str),

    #[error("No messages available for {0}")]
    NoMessages(String),

    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),
}

/// Process-level failures. Only these end the server.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] tokio_util::codec::LinesCodecError),
}
