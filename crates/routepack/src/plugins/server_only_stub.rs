use std::sync::Arc;

use async_trait::async_trait;
use routepack_core::plugin::LoadArgs;
use routepack_core::plugin::LoadResult;
use routepack_core::plugin::OnLoad;
use routepack_core::plugin::OnResolve;
use routepack_core::plugin::Plugin;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginRegistry;
use routepack_core::plugin::ResolveArgs;
use routepack_core::plugin::ResolveResult;
use routepack_core::types::Loader;

use super::resolve_claimed;

pub const SERVER_ONLY_NAMESPACE: &str = "server-only";

/// Replaces `*.server.*` modules with an empty module in browser builds
#[derive(Debug, Default)]
pub struct ServerOnlyStubPlugin;

impl Plugin for ServerOnlyStubPlugin {
  fn name(&self) -> &str {
    "server-only-stub"
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(
      r"\.server(\.[cm]?[jt]sx?)?$",
      None,
      Arc::new(ResolveServerOnly),
    )?;
    build.on_load(r".*", Some(SERVER_ONLY_NAMESPACE), Arc::new(LoadServerOnly))
  }
}

struct ResolveServerOnly;

#[async_trait]
impl OnResolve for ResolveServerOnly {
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    let path = resolve_claimed(ctx, args, &args.path, "server-only-stub")?;

    Ok(Some(ResolveResult::virtual_module(
      SERVER_ONLY_NAMESPACE,
      path.to_string_lossy(),
    )))
  }
}

struct LoadServerOnly;

#[async_trait]
impl OnLoad for LoadServerOnly {
  async fn on_load(
    &self,
    _ctx: &PluginContext,
    _args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    Ok(Some(LoadResult {
      loader: Loader::Empty,
      ..LoadResult::default()
    }))
  }
}
