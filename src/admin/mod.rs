//! The `admin` module implements the operator side of the server.
//!
//! `console` parses and executes the commands typed on the server's stdin
//! (inspect mode, delete, clear, kick, users, quit) and `export` writes
//! message logs to text files and reads them back.

pub mod console;
pub mod export;

pub use console::{AdminCommand, AdminConsole, Reply, run_console};

#[cfg(test)]
mod tests;
