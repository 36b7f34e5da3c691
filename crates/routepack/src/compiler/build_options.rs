use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use routepack_core::engine::BuildOptions;
use routepack_core::plugin::PluginRef;
use routepack_core::types::BuildTarget;
use routepack_plugin_css_modules::CssModulesPlugin;

use crate::config::RoutepackConfig;
use crate::loaders::loaders;
use crate::plugins::BrowserRouteModulePlugin;
use crate::plugins::CssBundleEntryPlugin;
use crate::plugins::ExtensionPlugins;
use crate::plugins::PlainStylesheetPlugin;
use crate::plugins::ServerOnlyStubPlugin;
use crate::plugins::UrlImportPlugin;
use crate::plugins::BROWSER_ROUTE_SUFFIX;
use crate::plugins::CSS_BUNDLE_ENTRY;

pub const ENTRY_CLIENT_NAME: &str = "entry.client";
pub const CSS_BUNDLE_NAME: &str = "css-bundle";

/// Assembles the engine options of one build target
///
/// Every call creates fresh plugin instances, so the two targets never share plugin state.
pub fn create_build_options(
  config: &RoutepackConfig,
  target: BuildTarget,
  externals: &BTreeSet<String>,
  extensions: &ExtensionPlugins,
) -> BuildOptions {
  let is_app = target == BuildTarget::Application;
  let mode = config.mode;

  let mut entry_points = IndexMap::new();
  if is_app {
    entry_points.insert(
      String::from(ENTRY_CLIENT_NAME),
      config.entry_client_path().to_string_lossy().into_owned(),
    );

    for route in &config.routes {
      entry_points.insert(
        route.id.clone(),
        format!(
          "{}{BROWSER_ROUTE_SUFFIX}",
          config.route_path(route).display()
        ),
      );
    }
  } else {
    entry_points.insert(
      String::from(CSS_BUNDLE_NAME),
      String::from(CSS_BUNDLE_ENTRY),
    );
  }

  // Scoped CSS is only emitted by the stylesheet target
  let css_modules = if is_app {
    CssModulesPlugin::bindings_only()
  } else {
    CssModulesPlugin::new()
  };

  let mut plugins: Vec<PluginRef> = vec![
    Arc::new(css_modules),
    Arc::new(CssBundleEntryPlugin::new(config)),
    Arc::new(PlainStylesheetPlugin),
    Arc::new(UrlImportPlugin),
  ];

  if let Some(markup) = &extensions.markup {
    plugins.push(markup());
  }

  if is_app {
    plugins.push(Arc::new(BrowserRouteModulePlugin));
  }

  plugins.push(Arc::new(ServerOnlyStubPlugin));

  if let Some(shims) = &extensions.shims {
    plugins.push(shims());
  }

  BuildOptions {
    entry_points,
    abs_working_dir: config.root_directory.clone(),
    outdir: config.assets_build_directory.clone(),
    public_path: config.public_path.clone(),
    entry_names: String::from("[dir]/[name]-[hash]"),
    chunk_names: String::from("_shared/[name]-[hash]"),
    asset_names: String::from("_assets/[name]-[hash]"),
    splitting: is_app,
    minify: mode.is_production(),
    sourcemap: !mode.is_production(),
    keep_names: mode.is_development(),
    define: BTreeMap::from([(
      String::from("process.env.NODE_ENV"),
      format!("\"{mode}\""),
    )]),
    external: externals.clone(),
    alias: config.alias.clone(),
    loader: loaders(),
    plugins,
    write: is_app,
    metafile: true,
    incremental: true,
    mode,
  }
}
