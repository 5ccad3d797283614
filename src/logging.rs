//! Log output for binaries built on this crate
//!
//! The library only emits `tracing` events; it never installs a subscriber.
//! Binaries call [`init_logging`] once at startup.
//!
//! ```text
//! ocigen ──tracing events──► EnvFilter (RUST_LOG) ──► fmt layer ──► stderr
//! ```
//!
//! Stdout is left alone because it carries the generated document.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "warn,ocigen=info";

/// Install a console subscriber writing to stderr
///
/// # Errors
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```ignore
/// ocigen::logging::init_logging()?;
/// ```
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("logging initialized");
    Ok(())
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging();
        assert!(init_logging().is_err());
    }
}
