//! Structured logging setup for the command-line tool.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable that overrides the CLI log level.
pub const LOG_ENV: &str = "FACTURAS_LOG";

/// Initialize structured logging on stderr based on CLI arguments.
///
/// # Errors
/// When a global subscriber is already installed.
pub fn init_tracing(
    verbose: bool,
    log_level: Option<&str>,
    log_json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = match (verbose, log_level) {
        (_, Some(level)) => level,
        (true, None) => "debug",
        (false, None) => "info",
    };

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| filter_for(level));
    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// A bare level applies to this crate only; a full directive is used as-is.
fn filter_for(level: &str) -> EnvFilter {
    if level.contains('=') {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(format!("facturas={level}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_scopes_bare_levels() {
        assert_eq!(filter_for("debug").to_string(), "facturas=debug");
        let custom = filter_for("warn,facturas=trace").to_string();
        assert!(custom.contains("facturas=trace"));
        assert!(!custom.contains("facturas=warn"));
    }
}
