//! Tracing initialisation for gitmig binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialise the global tracing subscriber.
///
/// `json` switches to newline-delimited JSON log lines; `level` is the
/// default verbosity when `RUST_LOG` is not set. Safe to call more than
/// once; only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let format = fmt::layer().with_target(false);
    let format = if json {
        format.json().boxed()
    } else {
        format.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init()
        .ok();
}
