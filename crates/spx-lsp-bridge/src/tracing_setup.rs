//! Tracing subscriber setup
//!
//! Shared by embedders and tests. `RUST_LOG` takes precedence; otherwise the
//! configured default level applies.

use crate::config::LoggingConfig;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber, writing to `log_file_path`.
pub fn init_global(log_file_path: &Path, config: &LoggingConfig) -> anyhow::Result<()> {
    let log_file = File::create(log_file_path)?;
    build_subscriber(Arc::new(log_file), config).try_init()?;
    Ok(())
}

/// Initialize the global subscriber, writing to stderr.
pub fn init_stderr(config: &LoggingConfig) -> anyhow::Result<()> {
    build_subscriber(io::stderr, config).try_init()?;
    Ok(())
}

/// Build a subscriber with an fmt layer over `writer`.
pub fn build_subscriber<W>(writer: W, config: &LoggingConfig) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.as_str()));

    let fmt_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
