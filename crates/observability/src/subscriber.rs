//! Subscriber construction.

use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for the server.
    #[default]
    Json,
    /// Human-readable lines, for CLI tools and local runs.
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT=pretty` selects [`LogFormat::Pretty`]; anything else is JSON.
    pub fn from_env() -> Self {
        Self::from_setting(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn from_setting(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_with(format: LogFormat, default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.compact().try_init().is_ok(),
    }
}
