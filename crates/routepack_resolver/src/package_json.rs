use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use routepack_filesystem::FileSystemRef;
use serde::Deserialize;

use crate::ResolverError;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BrowserField {
  #[default]
  None,
  EntryPoint(String),
  Map(HashMap<String, serde_json::Value>),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PackageJson {
  #[serde(skip)]
  pub path: PathBuf,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub main: Option<String>,
  #[serde(default)]
  pub module: Option<String>,
  #[serde(default)]
  pub browser: BrowserField,
}

impl PackageJson {
  /// Entry fields in the order a browser build prefers them
  pub fn entries(&self) -> impl Iterator<Item = PathBuf> + '_ {
    let browser = match &self.browser {
      BrowserField::EntryPoint(entry) => Some(entry.as_str()),
      BrowserField::Map(map) => self
        .main
        .as_deref()
        .and_then(|main| map.get(main).or_else(|| map.get(&format!("./{main}"))))
        .and_then(|value| value.as_str()),
      BrowserField::None => None,
    };

    let dir = self.path.parent().map(Path::to_path_buf).unwrap_or_default();

    [browser, self.module.as_deref(), self.main.as_deref()]
      .into_iter()
      .flatten()
      .map(move |entry| dir.join(entry))
  }
}

/// Parsed package.json files, keyed by path
#[derive(Debug)]
pub struct PackageJsonCache {
  fs: FileSystemRef,
  packages: RwLock<HashMap<PathBuf, Arc<PackageJson>>>,
}

impl PackageJsonCache {
  pub fn new(fs: FileSystemRef) -> Self {
    Self {
      fs,
      packages: RwLock::new(HashMap::new()),
    }
  }

  pub fn read(&self, path: &Path) -> Result<Arc<PackageJson>, ResolverError> {
    if let Some(package) = self.packages.read().get(path) {
      return Ok(package.clone());
    }

    let contents = self
      .fs
      .read_to_string(path)
      .map_err(|error| ResolverError::PackageJson {
        path: path.to_path_buf(),
        message: error.to_string(),
      })?;

    let mut package: PackageJson =
      serde_json::from_str(&contents).map_err(|error| ResolverError::PackageJson {
        path: path.to_path_buf(),
        message: error.to_string(),
      })?;

    package.path = path.to_path_buf();

    let package = Arc::new(package);
    self
      .packages
      .write()
      .insert(path.to_path_buf(), package.clone());

    Ok(package)
  }

  pub fn clear(&self) {
    self.packages.write().clear();
  }
}
