//! Process-wide log output. Code logs through the `log` macros, records are forwarded
//! into a `tracing-subscriber` fmt subscriber.
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use config::Logging;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(logging: &Logging) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let fmt_layer = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init() {
        eprintln!("Logger is already initialized: {}", e);
    }
}
