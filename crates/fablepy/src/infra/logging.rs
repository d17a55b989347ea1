//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays free for payloads and the stdio protocol.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

/// Default filter for a given `-v` count when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let tree = HierarchicalLayer::new(2)
        .with_writer(std::io::stderr)
        .with_targets(verbosity > 1)
        .with_bracketed_fields(true);

    let _ = tracing_subscriber::registry().with(filter).with(tree).try_init();
}
