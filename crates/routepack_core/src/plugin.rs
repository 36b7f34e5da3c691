use std::fmt::Debug;
use std::sync::Arc;

pub use plugin_context::*;
pub use plugin_registry::*;
pub use stages::*;

mod plugin_context;
mod plugin_registry;
mod stages;

/// Extends the engine with resolve and load stages
///
/// Plugins register their stages once per build through [`Plugin::setup`]. Stages are
/// consulted in registration order, so the order plugins are listed in decides which
/// resolve stage wins when several filters match.
pub trait Plugin: Debug + Send + Sync {
  fn name(&self) -> &str;

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()>;
}

pub type PluginRef = Arc<dyn Plugin>;
