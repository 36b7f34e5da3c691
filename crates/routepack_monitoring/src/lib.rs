//! Tracing setup for the routepack CLI.
//!
//! Output goes to stdout, to a rolling log file, or both, as selected by
//! `ROUTEPACK_TRACING_MODE`. Filtering follows `RUST_LOG`.
use std::sync::Mutex;

pub use from_env::FromEnvError;
pub use tracer::TracerMode;

mod from_env;
mod tracer;

/// Keeps the log writers alive until [`close_monitoring`]
static ACTIVE_TRACER: Mutex<Option<tracer::Tracer>> = Mutex::new(None);

#[derive(Debug, Default)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    Ok(Self {
      tracing_options: TracerMode::from_env()?,
    })
  }
}

/// Installs the global subscriber; only the first call in a process has an effect
pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut active = ACTIVE_TRACER
    .lock()
    .map_err(|_| anyhow::anyhow!("Tracing state was poisoned"))?;

  if active.is_some() {
    tracing::warn!("Tracing is already initialized, keeping the existing setup");
    return Ok(());
  }

  *active = Some(tracer::Tracer::new(&options.tracing_options)?);

  Ok(())
}

pub fn initialize_from_env() -> anyhow::Result<()> {
  initialize_monitoring(MonitoringOptions::from_env()?)
}

pub fn is_initialized() -> bool {
  ACTIVE_TRACER
    .lock()
    .map(|active| active.is_some())
    .unwrap_or(false)
}

/// Flushes buffered log lines and releases the log file
pub fn close_monitoring() {
  if let Ok(mut active) = ACTIVE_TRACER.lock() {
    active.take();
  }
}
