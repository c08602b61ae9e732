//! Logging and tracing setup.
//!
//! All logs go to **stderr**; stdout belongs to the host process.
//!
//! # Quick Start
//!
//! ```ignore
//! use tfe_provider::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     tracing::info!("Provider starting");
//! }
//! ```
//!
//! # Environment Variables
//!
//! The filter is taken from the first of these that is set:
//!
//! - `RUST_LOG`: full `EnvFilter` syntax (e.g. `debug`, `tfe_provider=trace`)
//! - `TF_LOG`: Terraform's level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`,
//!   any case; `JSON` means `trace`)
//!
//! Otherwise the default level applies (`info` unless given).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging, using `default_level` when neither `RUST_LOG` nor
/// `TF_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to set the subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var("TF_LOG")
        .ok()
        .and_then(|raw| tf_log_level(&raw))
        .unwrap_or(default_level);
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Map a `TF_LOG` value onto a filter directive.
fn tf_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" | "json" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}
