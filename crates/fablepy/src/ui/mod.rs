//! Host surfaces: command line, interactive prompt, and stdio protocol.

pub mod cli;
pub mod prompt;
pub mod session;
pub mod stdio;
