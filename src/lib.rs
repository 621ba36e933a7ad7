//! gz-git configuration library
//!
//! This module exports the configuration resolution engine for the
//! command-line binary and for integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod paths;
