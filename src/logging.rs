//! NL-010: Logging initialization.
//!
//! `RUST_LOG` always wins, then the `--log-level` filter, then `info`.
//! Human-readable output to stderr; `NO_COLOR` disables ANSI colors.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a CLI filter is set.
pub const DEFAULT_FILTER: &str = "info";

/// Pick the effective filter directive.
pub fn effective_filter(rust_log: Option<&str>, cli: Option<&str>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .or(cli)
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Initialize logging for the binary. Later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = effective_filter(rust_log.as_deref(), filter);
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(env_filter)
        .try_init();
}
