pub mod app;
pub mod domain;
pub mod infra;
pub mod ui;

/// Install logging for the given `-v` count.
pub fn init(verbosity: u8) {
    infra::logging::init(verbosity);
}
