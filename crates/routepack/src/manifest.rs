use std::path::PathBuf;

use indexmap::IndexMap;
use routepack_core::diagnostic_error;
use routepack_core::engine::Metafile;
use routepack_core::engine::MetafileOutput;
use routepack_core::hash::hash_bytes;
use routepack_core::lexer;
use routepack_filesystem::FileSystemRef;
use serde::Deserialize;
use serde::Serialize;

use crate::compiler::ENTRY_CLIENT_NAME;
use crate::config::RoutepackConfig;

/// Describes the browser build to the client runtime
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  pub version: String,
  /// Public URL of the manifest file itself
  pub url: String,
  pub entry: ManifestEntry,
  pub routes: IndexMap<String, ManifestRoute>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub css_bundle_path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
  pub module: String,
  pub imports: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRoute {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub index: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub case_sensitive: Option<bool>,
  pub module: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub imports: Option<Vec<String>>,
  pub has_action: bool,
  pub has_loader: bool,
  pub has_error_boundary: bool,
}

/// Builds the manifest from the application build's metafile
#[mockall::automock]
pub trait ManifestBuilder: Send + Sync {
  /// `css_bundle_path` is the on-disk path of the stylesheet bundle, if one was emitted
  fn build(
    &self,
    config: &RoutepackConfig,
    metafile: &Metafile,
    css_bundle_path: Option<PathBuf>,
  ) -> anyhow::Result<Manifest>;
}

/// Maps entry outputs to public URLs and reads route capabilities from route sources
#[derive(Debug)]
pub struct DefaultManifestBuilder {
  file_system: FileSystemRef,
}

impl DefaultManifestBuilder {
  pub fn new(file_system: FileSystemRef) -> Self {
    Self { file_system }
  }

  fn output_url(&self, config: &RoutepackConfig, key: &str) -> anyhow::Result<String> {
    config
      .public_url(&config.root_directory.join(key))
      .ok_or_else(|| {
        diagnostic_error!(
          "Output {key} is outside of {}",
          config.assets_build_directory.display()
        )
      })
  }

  fn imports(&self, config: &RoutepackConfig, output: &MetafileOutput) -> anyhow::Result<Vec<String>> {
    output
      .imports
      .iter()
      .filter(|import| !import.external)
      .map(|import| self.output_url(config, &import.path))
      .collect()
  }
}

impl ManifestBuilder for DefaultManifestBuilder {
  fn build(
    &self,
    config: &RoutepackConfig,
    metafile: &Metafile,
    css_bundle_path: Option<PathBuf>,
  ) -> anyhow::Result<Manifest> {
    let (entry_key, entry_output) = metafile
      .entry_output(ENTRY_CLIENT_NAME)
      .ok_or_else(|| diagnostic_error!("The build has no output for {ENTRY_CLIENT_NAME}"))?;

    let entry = ManifestEntry {
      module: self.output_url(config, entry_key)?,
      imports: self.imports(config, entry_output)?,
    };

    let mut routes = IndexMap::new();
    for route in &config.routes {
      let (key, output) = metafile
        .entry_output(&route.id)
        .ok_or_else(|| diagnostic_error!("The build has no output for route {}", route.id))?;

      let source = self.file_system.read_to_string(&config.route_path(route))?;
      let exports = lexer::exports(&source);
      let exports_name = |name: &str| exports.iter().any(|export| export == name);
      let imports = self.imports(config, output)?;

      routes.insert(
        route.id.clone(),
        ManifestRoute {
          id: route.id.clone(),
          parent_id: route.parent_id.clone(),
          path: route.path.clone(),
          index: route.index,
          case_sensitive: route.case_sensitive,
          module: self.output_url(config, key)?,
          imports: (!imports.is_empty()).then_some(imports),
          has_action: exports_name("action"),
          has_loader: exports_name("loader"),
          has_error_boundary: exports_name("ErrorBoundary"),
        },
      );
    }

    let css_bundle_path = css_bundle_path
      .map(|path| {
        config.public_url(&path).ok_or_else(|| {
          diagnostic_error!(
            "Stylesheet bundle {} is outside of {}",
            path.display(),
            config.assets_build_directory.display()
          )
        })
      })
      .transpose()?;

    let mut manifest = Manifest {
      version: String::new(),
      url: String::new(),
      entry,
      routes,
      css_bundle_path,
    };

    manifest.version = manifest_version(&manifest)?;

    Ok(manifest)
  }
}

/// 8 hex characters derived from the manifest content
fn manifest_version(manifest: &Manifest) -> anyhow::Result<String> {
  let mut version = hash_bytes(serde_json::to_string(manifest)?.as_bytes());
  version.truncate(8);
  Ok(version)
}
