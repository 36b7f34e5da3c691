use std::sync::Arc;

use async_trait::async_trait;
use routepack_core::plugin::OnResolve;
use routepack_core::plugin::Plugin;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginRegistry;
use routepack_core::plugin::ResolveArgs;
use routepack_core::plugin::ResolveResult;
use tracing::debug;

/// Keeps `http://` and `https://` imports as imports, so the browser fetches them
///
/// Remote modules are never downloaded or bundled.
#[derive(Debug, Default)]
pub struct UrlImportPlugin;

impl Plugin for UrlImportPlugin {
  fn name(&self) -> &str {
    "url-import"
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(r"^https?://", None, Arc::new(ResolveUrlImport))
  }
}

struct ResolveUrlImport;

#[async_trait]
impl OnResolve for ResolveUrlImport {
  async fn on_resolve(
    &self,
    _ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    debug!(url = %args.path, "Leaving URL import external");
    Ok(Some(ResolveResult::external(args.path.clone())))
  }
}
