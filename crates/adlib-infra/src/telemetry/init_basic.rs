use adlib_core::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "adlib=info";

/// Settings for the global tracing subscriber
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub environment: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl TelemetryOptions {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment: "development".to_string(),
            json: false,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    pub fn from_config(service_name: impl Into<String>, config: &Config) -> Self {
        Self {
            environment: config.0.environment.clone(),
            json: config.json_logs(),
            ..Self::new(service_name)
        }
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// Install the global subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(
    options: &TelemetryOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_filter.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    if options.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    tracing::info!(
        service = %options.service_name,
        environment = %options.environment,
        json = options.json,
        "Tracing initialized"
    );
    Ok(())
}
