//! Tracing subscriber setup.
//!
//! HTTP client and server internals (hyper, reqwest, rustls, tower_http) are
//! clamped to `warn` so upstream chatter does not drown the bridge's own
//! request logs. `RUST_LOG`, when set, replaces the computed filter entirely.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

/// Library targets held at `warn` regardless of the configured level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tower_http",
];

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with file and line
    Json,
    /// Coloured single-line output for terminals
    Pretty,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) is pretty.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

fn filter_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let level = match log_level.trim() {
        "" => "info",
        level => level,
    };

    std::iter::once(level.to_string())
        .chain(
            NOISY_MODULES
                .iter()
                .map(|m| m.to_string())
                .chain(excluded_targets.iter().cloned())
                .map(|target| format!("{}=warn", target)),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber from the observability section.
pub fn init_from_config(config: &ObservabilityConfig) {
    init_logging_with_exclusions(
        &config.log_level,
        &config.log_format,
        &config.excluded_targets,
    );
}

/// Install the global subscriber with a level and format only.
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Install the global subscriber, clamping `excluded_targets` to `warn` as well.
///
/// Later calls are ignored once a subscriber is installed.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = filter_directives(log_level, excluded_targets);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));
    let format = LogFormat::parse(log_format);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(true).with_target(true))
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(filter = %directives, ?format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Pretty);
    }

    #[test]
    fn test_filter_directives() {
        let directives = filter_directives("debug", &["market_bridge::data".to_string()]);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("tower_http=warn"));
        assert!(directives.ends_with("market_bridge::data=warn"));
    }

    #[test]
    fn test_blank_level_defaults_to_info() {
        assert!(filter_directives("  ", &[]).starts_with("info,"));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_from_config(&ObservabilityConfig::default());
        init_logging("debug", "json");
    }
}
