use serde::Deserialize;

pub use common::{Environment, LogLevel};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    pub environment: Environment,
    /// OTLP collector endpoint; telemetry export is off when unset.
    pub otel_endpoint: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8000)?
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as u64)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
