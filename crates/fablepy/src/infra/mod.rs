//! Infrastructure adapters for IO, config, logging, and execution backends.

pub mod backend;
pub mod clipboard;
pub mod config;
pub mod document;
pub mod fs;
pub mod logging;
pub mod notify;
