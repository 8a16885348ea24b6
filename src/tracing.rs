use std::str::FromStr;

use anyhow::Result;
use sentry::{integrations::tracing::EventFilter, types::Dsn};
use tracing::{Level, Metadata, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LogLevel, LoggerConfig, SentryConfig};

const MODULE_WHITELIST: &[&str] = &["tower_http", "sqlx::query", "gregslist"];

/// `RUST_LOG` wins, then `override_filter`, then the whitelist at `level`.
fn env_filter(override_filter: Option<&str>, level: &LogLevel) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = match override_filter {
        Some(filter) => filter.to_string(),
        None => MODULE_WHITELIST
            .iter()
            .map(|m| format!("{m}={level}"))
            .collect::<Vec<_>>()
            .join(","),
    };
    Ok(EnvFilter::try_new(directives)?)
}

fn fmt_layer<W>(make_writer: W, format: &LogFormat, ansi: bool) -> Box<dyn Layer<Registry> + Sync + Send>
where
    W: for<'writer> MakeWriter<'writer> + Sync + Send + 'static,
{
    let layer = fmt::Layer::default().with_ansi(ansi).with_writer(make_writer);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn sentry_event_filter(metadata: &Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        _ => EventFilter::Ignore,
    }
}

pub fn init_tracing(config: &LoggerConfig) {
    if !config.enable {
        return;
    }

    let filter = match env_filter(config.override_filter.as_deref(), &config.level) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("invalid log filter ({err}), falling back to `info`");
            EnvFilter::new("info")
        }
    };
    let sentry_layer = sentry::integrations::tracing::layer()
        .event_filter(sentry_event_filter)
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(fmt_layer(std::io::stdout, &config.format, true))
        .with(filter)
        .with(sentry_layer)
        .init();
}

pub fn init_sentry(sentry_cfg: &SentryConfig) -> Result<sentry::ClientInitGuard> {
    Ok(sentry::init(sentry::ClientOptions {
        dsn: Some(Dsn::from_str(&sentry_cfg.dsn)?),
        release: sentry::release_name!(),
        traces_sample_rate: sentry_cfg.traces_sample_rate,
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_directives_follow_level() {
        // RUST_LOG is not set under `cargo test` unless the caller exports it.
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = env_filter(None, &LogLevel::Debug).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("gregslist=debug"));
        assert!(rendered.contains("tower_http=debug"));
    }

    #[test]
    fn override_filter_replaces_whitelist() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = env_filter(Some("warn"), &LogLevel::Trace).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }
}
