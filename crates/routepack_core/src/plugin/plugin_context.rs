use std::fmt::Debug;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use routepack_filesystem::FileSystemRef;

use crate::types::BuildMode;

/// Resolves import specifiers to absolute file paths
#[mockall::automock]
pub trait Resolve: Debug + Send + Sync {
  /// Resolves `specifier` as if it was imported from a file inside `resolve_dir`
  fn resolve(&self, specifier: &str, resolve_dir: &Path) -> anyhow::Result<PathBuf>;
}

pub type ResolverRef = Arc<dyn Resolve>;

/// Everything a stage may use while handling a resolve or load
#[derive(Clone, Debug)]
pub struct PluginContext {
  pub file_system: FileSystemRef,
  pub mode: BuildMode,
  pub project_root: PathBuf,
  resolver: ResolverRef,
}

impl PluginContext {
  pub fn new(
    file_system: FileSystemRef,
    resolver: ResolverRef,
    project_root: PathBuf,
    mode: BuildMode,
  ) -> Self {
    Self {
      file_system,
      mode,
      project_root,
      resolver,
    }
  }

  /// Runs the default resolver without going through plugin stages
  ///
  /// Stages that claim a specifier but still want regular resolution, such as the scoped
  /// stylesheet stage, use this so aliases and package lookups keep working.
  pub fn resolve(&self, specifier: &str, resolve_dir: &Path) -> anyhow::Result<PathBuf> {
    self.resolver.resolve(specifier, resolve_dir)
  }

  /// Formats a path relative to the project root with forward slashes
  pub fn relative_path(&self, path: &Path) -> String {
    let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
    relative
      .components()
      .map(|component| component.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/")
  }
}
