//! Log output for the indexer processes.
//!
//! Events always go to stdout through a compact formatter filtered by `RUST_LOG`. When a collector
//! endpoint is configured, spans are also exported over OTLP under the instance name so that
//! several indexers feeding the same collector can be told apart.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use thiserror::Error;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Collector endpoint for span export. Export is off when unset.
pub const OTLP_URL_ENVVAR: &str = "STAKING_INDEXER_OTLP_URL";

/// Deployment label appended to the instance name, e.g. a region or a shard.
pub const SVC_LABEL_ENVVAR: &str = "STAKING_INDEXER_SVC_LABEL";

/// Set to `1` to print the source file of each event.
const LOG_FILE_ENVVAR: &str = "LOG_FILE";

/// Set to `1` to print the source line of each event.
const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

const TRACER_NAME: &str = "staking-indexer";

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The OTLP span exporter could not be built.
    #[error("could not build otlp exporter: {0}")]
    Exporter(String),

    /// A global subscriber has already been installed.
    #[error("could not install subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Where and under which name the indexer logs.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Name of this indexer instance, reported as the OTLP `service.name`.
    instance: String,

    /// Collector endpoint, if spans are exported.
    otlp_url: Option<String>,
}

impl LoggerConfig {
    /// Creates a stdout-only config reporting under `instance`.
    pub const fn new(instance: String) -> Self {
        Self {
            instance,
            otlp_url: None,
        }
    }

    /// Creates a config named after `base` and the deployment label, if one is set.
    pub fn with_base_name(base: &str) -> Self {
        Self::new(instance_name(base))
    }

    /// Enables span export to the collector at `url`.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otlp_url = Some(url);
    }

    /// The name this indexer instance reports under.
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("staking-indexer")
    }
}

/// Installs the global subscriber described by `config`.
///
/// Fails if the exporter cannot be built or if a subscriber is already installed.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let stdout = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(flag_from_env(LOG_FILE_ENVVAR))
                .with_line_number(flag_from_env(LOG_LINE_NUM_ENVVAR)),
        )
        .with_filter(tracing_subscriber::EnvFilter::from_default_env());

    match &config.otlp_url {
        Some(url) => {
            let tracer = span_exporter(url, &config.instance)?.tracer(TRACER_NAME);

            tracing_subscriber::registry()
                .with(stdout)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
        }
        None => tracing_subscriber::registry().with(stdout).try_init()?,
    }

    info!(instance = %config.instance, otlp = config.otlp_url.is_some(), "logging started");

    Ok(())
}

fn span_exporter(url: &str, instance: &str) -> Result<SdkTracerProvider, LoggingError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()
        .map_err(|e| LoggingError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", instance.to_owned()))
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

/// Reads the collector endpoint from [`OTLP_URL_ENVVAR`].
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Builds the instance name from `base` and [`SVC_LABEL_ENVVAR`].
pub fn instance_name(base: &str) -> String {
    join_label(base, env::var(SVC_LABEL_ENVVAR).ok().as_deref())
}

fn flag_from_env(var: &str) -> bool {
    env::var(var).is_ok_and(|v| v == "1")
}

fn join_label(base: &str, label: Option<&str>) -> String {
    match label {
        Some(label) if !label.is_empty() => format!("{base}%{label}"),
        _ => base.to_owned(),
    }
}
