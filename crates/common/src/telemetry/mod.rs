//! Tracing subscriber setup shared by the gateway and the worker
//!
//! Logs go to stdout (JSON in production). When an OTLP endpoint is
//! configured, spans are also exported over OTLP/HTTP.

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| AppError::Configuration {
            message: format!("invalid log filter '{}': {}", config.log_level, e),
        })
}

fn otlp_provider(endpoint: &str, service_name: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("failed to build OTLP exporter: {}", e),
        })?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
            KeyValue::new("service.version", crate::VERSION),
        ]))
        .build())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let fmt_layer = if config.json_logging {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let otel_layer = match &config.otel_endpoint {
        Some(endpoint) => {
            let provider = otlp_provider(endpoint, &config.service_name)?;
            let tracer = provider.tracer(config.service_name.clone());
            global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| AppError::Configuration {
            message: format!("failed to install tracing subscriber: {}", e),
        })
}

/// Flush pending spans
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> ObservabilityConfig {
        ObservabilityConfig {
            log_level: level.to_string(),
            ..ObservabilityConfig::default()
        }
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(env_filter(&config("info")).is_ok());
        assert!(env_filter(&config("contentforge_common=debug,tower_http=warn")).is_ok());
    }
}
