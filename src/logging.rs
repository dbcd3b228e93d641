//! Tracing setup.
//!
//! The subscriber is installed before the config file is read so anything
//! logged while loading it reaches the terminal. The config's `log_level`
//! is applied afterwards through a reload handle, unless `--verbose` or
//! `RUST_LOG` already picked a filter.

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Filter used until the config has been read
const STARTUP_LEVEL: &str = "info";

/// Pick the filter directive: `--verbose` wins, then `RUST_LOG`, then `fallback`
pub fn resolve_filter(verbose: bool, env: Option<&str>, fallback: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    match env.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => fallback.to_lowercase(),
    }
}

/// Handle on the installed filter
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogHandle {
    /// Switch to the configured level unless one was pinned at startup
    pub fn apply_config_level(&self, level: &str) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        let level: LevelFilter = level.trim().parse()?;
        self.handle
            .reload(EnvFilter::default().add_directive(level.into()))?;
        Ok(())
    }
}

fn build_subscriber<W>(
    directive: &str,
    writer: W,
) -> Result<(impl Subscriber + Send + Sync + 'static, reload::Handle<EnvFilter, Registry>)>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(EnvFilter::try_new(directive)?);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    Ok((subscriber, handle))
}

/// Install the global subscriber. Call before anything else logs.
pub fn init(verbose: bool) -> Result<LogHandle> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let pinned = verbose || env.as_deref().is_some_and(|v| !v.trim().is_empty());
    let directive = resolve_filter(verbose, env.as_deref(), STARTUP_LEVEL);

    let (subscriber, handle) = build_subscriber(&directive, std::io::stdout)?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(LogHandle { handle, pinned })
}
