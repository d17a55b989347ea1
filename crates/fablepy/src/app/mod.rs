//! Application layer orchestrating domain logic and infrastructure.

pub mod commands;
pub mod runner;
pub mod scan;
pub mod session;
pub mod sync;
