use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use routepack_core::diagnostic::CodeFrame;
use routepack_core::diagnostic::DiagnosticBuilder;
use routepack_core::diagnostic_error;
use routepack_core::types::BuildMode;
use routepack_filesystem::FileSystem;
use serde::Deserialize;
use serde::Serialize;

pub const CONFIG_FILE_NAME: &str = "routepack.config.json";

const ENTRY_CLIENT_CANDIDATES: [&str; 4] = [
  "entry.client.tsx",
  "entry.client.ts",
  "entry.client.jsx",
  "entry.client.js",
];

/// Project configuration read from `routepack.config.json`
///
/// Every path is absolute once loaded through [`load_config`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutepackConfig {
  #[serde(skip)]
  pub root_directory: PathBuf,

  pub app_directory: PathBuf,

  /// Directory the browser assets and the manifest are written to
  pub assets_build_directory: PathBuf,

  /// URL prefix the assets build directory is served from, always ending in `/`
  pub public_path: String,

  /// Client entry, relative to the app directory; detected when omitted
  pub entry_client_file: Option<PathBuf>,

  pub routes: Vec<RouteConfig>,

  /// Import specifier prefixes replaced before resolution
  pub alias: BTreeMap<String, String>,

  #[serde(skip)]
  pub mode: BuildMode,
}

impl Default for RoutepackConfig {
  fn default() -> Self {
    Self {
      root_directory: PathBuf::new(),
      app_directory: PathBuf::from("app"),
      assets_build_directory: PathBuf::from("public/build"),
      public_path: String::from("/build/"),
      entry_client_file: None,
      routes: Vec::new(),
      alias: BTreeMap::new(),
      mode: BuildMode::default(),
    }
  }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
  pub id: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub index: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub case_sensitive: Option<bool>,

  /// Route module, relative to the app directory
  pub file: PathBuf,
}

impl RoutepackConfig {
  pub fn entry_client_path(&self) -> PathBuf {
    self
      .app_directory
      .join(self.entry_client_file.as_deref().unwrap_or(Path::new(ENTRY_CLIENT_CANDIDATES[0])))
  }

  pub fn route_path(&self, route: &RouteConfig) -> PathBuf {
    self.app_directory.join(&route.file)
  }

  /// The URL a file inside the assets build directory is served from
  pub fn public_url(&self, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&self.assets_build_directory).ok()?;
    let relative = relative
      .components()
      .map(|component| component.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    Some(format!("{}{relative}", self.public_path))
  }
}

/// Reads the configuration of the project in `root_directory`
///
/// A missing config file means every default applies. Relative paths are resolved against
/// the root directory, and the routes are validated against the file system.
pub fn load_config(
  fs: &dyn FileSystem,
  root_directory: &Path,
  config_file: Option<&Path>,
  mode: BuildMode,
) -> anyhow::Result<RoutepackConfig> {
  let config_path = config_file
    .map(|file| root_directory.join(file))
    .unwrap_or_else(|| root_directory.join(CONFIG_FILE_NAME));

  let mut config = if fs.is_file(&config_path) {
    let contents = fs.read_to_string(&config_path)?;
    serde_json::from_str::<RoutepackConfig>(&contents).map_err(|error| {
      diagnostic_error!(DiagnosticBuilder::default()
        .message(format!("Invalid config {}: {error}", config_path.display()))
        .code_frames(vec![CodeFrame::new(config_path.clone(), contents.clone())]))
    })?
  } else if config_file.is_some() {
    return Err(diagnostic_error!(
      "Config file {} does not exist",
      config_path.display()
    ));
  } else {
    RoutepackConfig::default()
  };

  config.root_directory = root_directory.to_path_buf();
  config.app_directory = root_directory.join(&config.app_directory);
  config.assets_build_directory = root_directory.join(&config.assets_build_directory);
  config.mode = mode;

  if !config.public_path.ends_with('/') {
    config.public_path.push('/');
  }

  if config.entry_client_file.is_none() {
    config.entry_client_file = ENTRY_CLIENT_CANDIDATES
      .iter()
      .map(PathBuf::from)
      .find(|candidate| fs.is_file(&config.app_directory.join(candidate)));
  }

  validate(fs, &config)?;

  Ok(config)
}

fn validate(fs: &dyn FileSystem, config: &RoutepackConfig) -> anyhow::Result<()> {
  let entry_client = config.entry_client_path();
  if !fs.is_file(&entry_client) {
    return Err(diagnostic_error!(DiagnosticBuilder::default()
      .message(format!(
        "Missing client entry {}",
        entry_client.display()
      ))
      .hints(vec![format!(
        "Create {} or set entryClientFile in {CONFIG_FILE_NAME}",
        ENTRY_CLIENT_CANDIDATES.join(", ")
      )])));
  }

  let mut ids = HashSet::new();
  for route in &config.routes {
    if !ids.insert(route.id.as_str()) {
      return Err(diagnostic_error!("Route {} is defined more than once", route.id));
    }
  }

  for route in &config.routes {
    if let Some(parent_id) = &route.parent_id {
      if !ids.contains(parent_id.as_str()) {
        return Err(diagnostic_error!(
          "Route {} has an unknown parent {parent_id}",
          route.id
        ));
      }
    }

    let file = config.route_path(route);
    if !fs.is_file(&file) {
      return Err(diagnostic_error!(
        "Route {} points at {}, which does not exist",
        route.id,
        file.display()
      ));
    }
  }

  Ok(())
}
