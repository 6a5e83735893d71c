//! Logging setup built on `tracing`.
//!
//! Status lines meant for people go through [`crate::ui`]; everything else is
//! a `tracing` event filtered here.
//!
//! ```rust,no_run
//! use spry_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!(task = "styles", "rebuilt");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "spry=debug,spry_cli=debug,spry_config=debug,spry_pipeline=debug,tower_http=debug";
const QUIET_FILTER: &str = "spry=error,spry_cli=error";
const DEFAULT_FILTER: &str = "spry=info,spry_cli=info,spry_config=info,spry_pipeline=info";

/// Initialize the tracing subscriber with the specified options.
///
/// Should be called once at the start of the program.
///
/// # Verbosity Levels
///
/// 1. `--verbose` sets DEBUG for spry crates and request tracing
/// 2. `--quiet` shows errors only
/// 3. `RUST_LOG` overrides the default when neither flag is given
/// 4. Otherwise INFO for spry crates
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Initialize logger with a custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_environment() {
        let filter = filter_for(true, false);
        assert!(filter.to_string().contains("spry_cli=debug"));
    }

    #[test]
    fn quiet_filter_is_errors_only() {
        let filter = filter_for(false, true);
        assert!(filter.to_string().contains("spry_cli=error"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logger(false, true, true);
        init_logger(false, true, true);
    }
}
