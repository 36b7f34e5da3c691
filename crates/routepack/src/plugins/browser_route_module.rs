use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use routepack_core::diagnostic_error;
use routepack_core::lexer;
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
use tracing::debug;

use super::resolve_claimed;

pub const BROWSER_ROUTE_NAMESPACE: &str = "browser-route-module";
pub const BROWSER_ROUTE_SUFFIX: &str = "?browser";

/// Route module exports that are safe to ship to the browser
pub const BROWSER_SAFE_EXPORTS: [&str; 7] = [
  "CatchBoundary",
  "ErrorBoundary",
  "default",
  "handle",
  "links",
  "meta",
  "shouldRevalidate",
];

/// Turns `<route file>?browser` entries into modules that re-export only browser safe names
///
/// Everything else a route exports, such as `loader` and `action`, is dropped together
/// with the imports only those exports use.
#[derive(Debug, Default)]
pub struct BrowserRouteModulePlugin;

impl Plugin for BrowserRouteModulePlugin {
  fn name(&self) -> &str {
    "browser-route-module"
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(r"\?browser$", None, Arc::new(ResolveBrowserRoute))?;
    build.on_load(
      r".*",
      Some(BROWSER_ROUTE_NAMESPACE),
      Arc::new(LoadBrowserRoute),
    )
  }
}

struct ResolveBrowserRoute;

#[async_trait]
impl OnResolve for ResolveBrowserRoute {
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    let file = args
      .path
      .strip_suffix(BROWSER_ROUTE_SUFFIX)
      .unwrap_or(&args.path);
    let path = resolve_claimed(ctx, args, file, "browser-route-module")?;

    Ok(Some(ResolveResult::virtual_module(
      BROWSER_ROUTE_NAMESPACE,
      path.to_string_lossy(),
    )))
  }
}

struct LoadBrowserRoute;

#[async_trait]
impl OnLoad for LoadBrowserRoute {
  async fn on_load(
    &self,
    ctx: &PluginContext,
    args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    let path = PathBuf::from(&args.path);
    let source = ctx
      .file_system
      .read_to_string(&path)
      .map_err(|error| diagnostic_error!("Failed to read {}: {error}", path.display()))?;

    let exports = lexer::exports(&source)
      .into_iter()
      .filter(|name| BROWSER_SAFE_EXPORTS.contains(&name.as_str()))
      .collect::<Vec<_>>();

    debug!(route = %args.path, ?exports, "Selected browser exports");

    let contents = if exports.is_empty() {
      String::from("export {};\n")
    } else {
      format!(
        "export {{ {} }} from {};\n",
        exports.join(", "),
        serde_json::to_string(&args.path)?
      )
    };

    Ok(Some(LoadResult {
      contents,
      loader: Loader::Js,
      resolve_dir: path.parent().map(Path::to_path_buf),
      plugin_data: None,
    }))
  }
}
