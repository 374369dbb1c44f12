//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `linesub` application.
//!
//! This module centralizes the error taxonomy, logging setup and the lock
//! helpers shared by the broker, transport and admin layers.

pub mod error;
pub mod logging;
pub mod sync;
