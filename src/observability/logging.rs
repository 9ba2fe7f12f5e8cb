//! Structured logging configuration.

use std::path::PathBuf;

/// Default filter directive.
const DEFAULT_FILTER: &str = "info";
/// Filter directive used with `--verbose`.
const VERBOSE_FILTER: &str = "debug";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional file to append log lines to instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from the process environment.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    /// Builds logging configuration from variables read through `lookup`.
    ///
    /// - filter: `--verbose` forces `debug`; otherwise `QUERYTRAIL_LOG`, then
    ///   `RUST_LOG`, then `info`
    /// - format: `QUERYTRAIL_LOG_FORMAT` (`pretty` or `json`)
    /// - file: `QUERYTRAIL_LOG_FILE`
    #[must_use]
    pub fn from_lookup<F>(verbose: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let filter = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            get("QUERYTRAIL_LOG")
                .or_else(|| get("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };
        let format = get("QUERYTRAIL_LOG_FORMAT")
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = get("QUERYTRAIL_LOG_FILE").map(PathBuf::from);

        Self {
            filter,
            format,
            file,
        }
    }

    /// Overrides the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_lookup(false, lookup(&[]));
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_filter_precedence() {
        let config = LoggingConfig::from_lookup(
            false,
            lookup(&[("RUST_LOG", "warn"), ("QUERYTRAIL_LOG", "querytrail=trace")]),
        );
        assert_eq!(config.filter, "querytrail=trace");

        let config = LoggingConfig::from_lookup(false, lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.filter, "warn");
    }

    #[test]
    fn test_verbose_forces_debug() {
        let config = LoggingConfig::from_lookup(true, lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.filter, "debug");
    }

    #[test]
    fn test_format_and_file() {
        let config = LoggingConfig::from_lookup(
            false,
            lookup(&[
                ("QUERYTRAIL_LOG_FORMAT", "JSON"),
                ("QUERYTRAIL_LOG_FILE", "/tmp/querytrail.log"),
            ]),
        );
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/querytrail.log")));
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let config =
            LoggingConfig::from_lookup(false, lookup(&[("QUERYTRAIL_LOG_FORMAT", "xml")]));
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Pretty));
    }
}
