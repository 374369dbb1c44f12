//! # linesub
//!
//! `linesub` is an in-memory, topic-based publish/subscribe broker spoken
//! over a newline-delimited TCP text protocol, with an operator console that
//! can freeze one topic at a time ("inspect mode") to list, delete and clear
//! its messages while the topic's clients defer their traffic.
//!
//! ## Core Modules
//!
//! - `broker`: messages, the topic registry and the shared broker state.
//! - `client`: the server-side view of one connection and its registration.
//! - `transport`: wire commands, the TCP listener and per-connection handler.
//! - `admin`: the operator console and message exports.
//! - `terminal`: the interactive client and its command router.
//! - `config`: loading settings from file and environment.
//! - `utils`: error types, logging setup and lock helpers.

pub mod admin;
pub mod broker;
pub mod client;
pub mod config;
pub mod terminal;
pub mod transport;
pub mod utils;
