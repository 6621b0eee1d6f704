//! Process-wide tracing setup

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Install a stderr subscriber at `level`
///
/// `RUST_LOG`, when set, replaces the level-based filter. Calling this a
/// second time leaves the first subscriber in place.
pub fn init_logging(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rusqlite=warn,reqwest=warn,hyper=warn,{level}")));
    let installed = registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
