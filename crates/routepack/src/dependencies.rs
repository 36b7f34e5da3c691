use std::path::Path;

use routepack_core::diagnostic_error;
use routepack_filesystem::FileSystem;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
  #[serde(default)]
  dependencies: Map<String, Value>,
}

/// Names of the application dependencies declared in `<root>/package.json`
///
/// A project without a package.json has no dependencies.
pub fn read_dependencies(fs: &dyn FileSystem, root_directory: &Path) -> anyhow::Result<Vec<String>> {
  let path = root_directory.join("package.json");
  if !fs.is_file(&path) {
    return Ok(Vec::new());
  }

  let contents = fs.read_to_string(&path)?;
  let package = serde_json::from_str::<PackageJson>(&contents)
    .map_err(|error| diagnostic_error!("Failed to parse {}: {error}", path.display()))?;

  Ok(package.dependencies.keys().cloned().collect())
}
