//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Subscriber settings. `RUST_LOG` always wins over `default_filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub default_filter: String,
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn plain(mut self) -> Self {
        self.json = false;
        self
    }

    /// Defaults overridden by `IDBRIDGE_LOG_FILTER` and
    /// `IDBRIDGE_LOG_FORMAT` (`plain` or `json`).
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(filter) = lookup("IDBRIDGE_LOG_FILTER").filter(|f| !f.trim().is_empty()) {
            config = config.with_filter(filter.trim());
        }
        // Anything other than `plain` keeps JSON.
        if lookup("IDBRIDGE_LOG_FORMAT").is_some_and(|f| f.trim().eq_ignore_ascii_case("plain")) {
            config = config.plain();
        }
        config
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    // JSON for machines, plain text for local runs.
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_selects_filter_and_format() {
        let config = ObservabilityConfig::from_lookup(|var| match var {
            "IDBRIDGE_LOG_FILTER" => Some("idbridge_client=debug".to_string()),
            "IDBRIDGE_LOG_FORMAT" => Some("Plain".to_string()),
            _ => None,
        });

        assert_eq!(config.default_filter, "idbridge_client=debug");
        assert!(!config.json);
    }

    #[test]
    fn unset_or_unknown_env_keeps_defaults() {
        assert_eq!(ObservabilityConfig::from_lookup(|_| None), ObservabilityConfig::default());

        let config = ObservabilityConfig::from_lookup(|var| {
            (var == "IDBRIDGE_LOG_FORMAT").then(|| "yaml".to_string())
        });
        assert!(config.json);
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        let config = ObservabilityConfig::default().with_filter("debug").plain();
        init(&config);
        init(&config);
        init(&ObservabilityConfig::default());
    }
}
