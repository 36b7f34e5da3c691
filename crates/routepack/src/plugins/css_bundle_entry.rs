use std::path::PathBuf;
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

use crate::config::RoutepackConfig;

/// Fixed id of the stylesheet target's only entry, also used as its namespace
pub const CSS_BUNDLE_ENTRY: &str = "css-bundle-entry";

/// Provides a virtual entry that imports the client entry and every route
///
/// Bundling it collects every stylesheet the application reaches into one CSS output.
#[derive(Debug)]
pub struct CssBundleEntryPlugin {
  imports: Vec<PathBuf>,
  resolve_dir: PathBuf,
}

impl CssBundleEntryPlugin {
  pub fn new(config: &RoutepackConfig) -> Self {
    let mut imports = vec![config.entry_client_path()];
    imports.extend(config.routes.iter().map(|route| config.route_path(route)));

    Self {
      imports,
      resolve_dir: config.root_directory.clone(),
    }
  }
}

impl Plugin for CssBundleEntryPlugin {
  fn name(&self) -> &str {
    "css-bundle-entry"
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(r"^css-bundle-entry$", None, Arc::new(ResolveCssBundleEntry))?;
    build.on_load(
      r".*",
      Some(CSS_BUNDLE_ENTRY),
      Arc::new(LoadCssBundleEntry {
        imports: self.imports.clone(),
        resolve_dir: self.resolve_dir.clone(),
      }),
    )
  }
}

struct ResolveCssBundleEntry;

#[async_trait]
impl OnResolve for ResolveCssBundleEntry {
  async fn on_resolve(
    &self,
    _ctx: &PluginContext,
    _args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    Ok(Some(ResolveResult::virtual_module(
      CSS_BUNDLE_ENTRY,
      CSS_BUNDLE_ENTRY,
    )))
  }
}

struct LoadCssBundleEntry {
  imports: Vec<PathBuf>,
  resolve_dir: PathBuf,
}

#[async_trait]
impl OnLoad for LoadCssBundleEntry {
  async fn on_load(
    &self,
    _ctx: &PluginContext,
    _args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    let mut contents = String::new();
    for import in &self.imports {
      contents += &format!("import {};\n", serde_json::to_string(&import.to_string_lossy())?);
    }

    Ok(Some(LoadResult {
      contents,
      loader: Loader::Js,
      resolve_dir: Some(self.resolve_dir.clone()),
      plugin_data: None,
    }))
  }
}
