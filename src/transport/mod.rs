//! The `transport` module is responsible for handling network communication
//! with clients over a newline-delimited TCP text protocol.
//!
//! It defines the wire commands and the inspect control line, the backlog
//! used to defer restricted commands during inspection, the per-connection
//! handler and the listener that accepts connections and hands them to it.

pub mod backlog;
pub mod command;
pub mod connection;
pub mod server;

pub use backlog::Backlog;
pub use command::Command;
pub use server::TcpServer;

#[cfg(test)]
mod tests;
