use crate::config::{Environment, LogLevel};
use opentelemetry::global;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber: pretty output for development and JSON
/// for production.
///
/// `RUST_LOG` takes precedence; `default_level` applies when it is unset.
///
/// The OpenTelemetry layer bridges spans to whatever global tracer provider
/// is installed. Without a `TelemetryGuard` that is the no-op provider, so
/// the layer costs nothing.
pub fn setup_logging(service_name: &str, default_level: LogLevel, environment: Environment) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.as_str()));

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(global::tracer(service_name.to_string()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
