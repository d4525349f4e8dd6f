//! Logging and trace export.
//!
//! Console logging through `tracing-subscriber` is always on and filtered by
//! `RUST_LOG` (default `info`). With `enable_otel_export: true`, spans are
//! also exported over OTLP/HTTP, configured through the standard variables:
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` (default `http://localhost:4318`)
//! - `OTEL_EXPORTER_OTLP_PROTOCOL`: `http/protobuf` (default) or `http/json`
//! - `OTEL_EXPORTER_OTLP_HEADERS`: comma-separated `key=value` pairs, `%20` decodes to a space
//! - `OTEL_SERVICE_NAME` (default `cloudfiler`)
//!
//! If the exporter cannot be built, startup continues with console logging only.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "cloudfiler";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Kept so pending spans can be flushed on shutdown; `tracing-opentelemetry`
/// only holds the tracer.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(enable_otel_export: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (otel_layer, otel_status) = if enable_otel_export {
        match otlp_tracer() {
            Ok(tracer) => (Some(tracing_opentelemetry::layer().with_tracer(tracer)), "enabled".to_string()),
            Err(e) => (None, format!("unavailable: {e}")),
        }
    } else {
        (None, "disabled".to_string())
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()?;

    info!(otlp_export = %otel_status, "Telemetry initialized");
    Ok(())
}

/// Parse `OTEL_EXPORTER_OTLP_HEADERS`
fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.replace("%20", " ")
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn otlp_tracer() -> anyhow::Result<Tracer> {
    let service_name = std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());
    let headers = std::env::var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_headers(&raw))
        .unwrap_or_default();
    let protocol = match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
        Ok("http/json") => Protocol::HttpJson,
        _ => Protocol::HttpBinary,
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&endpoint)
        .with_protocol(protocol)
        .with_headers(headers)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_attribute(KeyValue::new("service.name", service_name.clone()))
                .build(),
        )
        .build();

    let tracer = provider.tracer(service_name);
    let _ = TRACER_PROVIDER.set(provider);
    Ok(tracer)
}

/// Flush and stop trace export. No-op when export was never enabled.
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        tracing::error!("Failed to shutdown tracer provider: {}", e);
    }
}
