use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use routepack_core::diagnostic_error;
use routepack_core::plugin::LoadArgs;
use routepack_core::plugin::LoadResult;
use routepack_core::plugin::OnLoad;
use routepack_core::plugin::OnResolve;
use routepack_core::plugin::Plugin;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginRegistry;
use routepack_core::plugin::ResolveArgs;
use routepack_core::plugin::ResolveKind;
use routepack_core::plugin::ResolveResult;
use routepack_core::types::Loader;

use super::resolve_claimed;

pub const PLAIN_STYLESHEET_NAMESPACE: &str = "plain-stylesheet";

/// Emits stylesheets imported from scripts as assets, so the import evaluates to a URL
///
/// `@import` and `url()` references between stylesheets are left to the engine.
#[derive(Debug, Default)]
pub struct PlainStylesheetPlugin;

impl Plugin for PlainStylesheetPlugin {
  fn name(&self) -> &str {
    "plain-stylesheet"
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(r"\.css$", None, Arc::new(ResolvePlainStylesheet))?;
    build.on_load(
      r".*",
      Some(PLAIN_STYLESHEET_NAMESPACE),
      Arc::new(LoadPlainStylesheet),
    )
  }
}

struct ResolvePlainStylesheet;

#[async_trait]
impl OnResolve for ResolvePlainStylesheet {
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    if matches!(args.kind, ResolveKind::ImportRule | ResolveKind::UrlToken) {
      return Ok(None);
    }

    let path = resolve_claimed(ctx, args, &args.path, "plain-stylesheet")?;

    Ok(Some(ResolveResult::virtual_module(
      PLAIN_STYLESHEET_NAMESPACE,
      path.to_string_lossy(),
    )))
  }
}

struct LoadPlainStylesheet;

#[async_trait]
impl OnLoad for LoadPlainStylesheet {
  async fn on_load(
    &self,
    ctx: &PluginContext,
    args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    let path = PathBuf::from(&args.path);
    let contents = ctx
      .file_system
      .read_to_string(&path)
      .map_err(|error| diagnostic_error!("Failed to read {}: {error}", path.display()))?;

    Ok(Some(LoadResult {
      contents,
      loader: Loader::File,
      resolve_dir: path.parent().map(Path::to_path_buf),
      plugin_data: None,
    }))
  }
}
