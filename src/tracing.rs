use std::fs::File;
use std::io::stdout;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Filter, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

pub enum Output {
    Stdout,
    File,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    pub enabled: bool,
    pub json_logging: bool,
    pub json_flatten: bool,
    pub ansi: bool,
    pub span_active: bool,
    pub span_full: bool,
}

impl OutputConfig {
    pub fn text_ansi() -> Self {
        Self {
            enabled: true,
            json_logging: false,
            json_flatten: false,
            ansi: true,
            span_active: false,
            span_full: false,
        }
    }

    pub fn json() -> Self {
        Self {
            enabled: true,
            json_logging: true,
            json_flatten: true,
            ansi: false,
            span_active: false,
            span_full: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            json_logging: false,
            json_flatten: false,
            ansi: false,
            span_active: false,
            span_full: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    pub stdout: OutputConfig,
    pub file: OutputConfig,
    pub file_path: Option<String>,
}

impl TracingConfig {
    pub fn local_dev() -> Self {
        Self {
            stdout: OutputConfig::text_ansi(),
            file: OutputConfig::disabled(),
            file_path: None,
        }
    }

    pub fn deployment() -> Self {
        Self {
            stdout: OutputConfig::json(),
            file: OutputConfig::disabled(),
            file_path: None,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::local_dev()
    }
}

pub fn init_tracing_with_default_env_filter(config: &TracingConfig) {
    init(config, |_output| None)
}

pub fn init<F>(config: &TracingConfig, make_filter: F)
where
    F: Fn(Output) -> Option<Box<dyn Filter<Registry> + 'static + Send + Sync>>,
{
    let filter = |output: Output| -> Box<dyn Filter<Registry> + 'static + Send + Sync> {
        make_filter(output).unwrap_or(Box::new(EnvFilter::from_default_env()))
    };

    let mut layers = Vec::new();

    if config.stdout.enabled {
        layers.push(make_layer(&config.stdout, filter(Output::Stdout), stdout))
    }

    match config.file_path {
        Some(ref file_path) if config.file.enabled => {
            let file = File::create(file_path).unwrap_or_else(|err| {
                panic!("cannot create log file: {}, error: {}", file_path, err)
            });
            layers.push(make_layer(
                &config.file,
                filter(Output::File),
                Arc::new(file),
            ))
        }
        _ => {}
    }

    tracing_subscriber::registry().with(layers).init();

    debug!(
        // NOTE: intentionally logged as string and not as structured
        tracing_config = serde_json::to_string(&config).expect("cannot serialize log config"),
        "Tracing inited"
    );
}

fn make_layer<W>(
    config: &OutputConfig,
    filter: Box<dyn Filter<Registry> + 'static + Send + Sync>,
    writer: W,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
{
    let span_events = {
        if config.span_full {
            FmtSpan::FULL
        } else if config.span_active {
            FmtSpan::ACTIVE
        } else {
            FmtSpan::NONE
        }
    };

    if config.json_logging {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(config.json_flatten)
            .with_span_events(span_events)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(config.ansi)
            .with_span_events(span_events)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    }
}
