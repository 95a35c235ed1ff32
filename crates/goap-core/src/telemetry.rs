//! Tracing setup for GOAP binaries.
//!
//! Without `RUST_LOG`, only the GOAP crates log at the requested level;
//! dependencies stay at `warn`. Only the first call installs a subscriber.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const GOAP_TARGETS: [&str; 2] = ["goap_core", "goapd"];

/// Default filter directive for `level`, e.g. `warn,goap_core=info,goapd=info`.
pub fn default_directive(level: Level) -> String {
    GOAP_TARGETS
        .iter()
        .fold(String::from("warn"), |mut directive, target| {
            directive.push_str(&format!(",{target}={level}"));
            directive
        })
        .to_lowercase()
}

/// Install the global subscriber: JSON lines when `json`, text otherwise.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    let layer = fmt::layer().with_target(json);

    let subscriber = tracing_subscriber::registry().with(filter);
    let installed = if json {
        subscriber.with(layer.json().flatten_event(true)).try_init()
    } else {
        subscriber.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
