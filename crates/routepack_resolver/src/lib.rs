use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use routepack_core::plugin::Resolve;
use routepack_filesystem::FileSystemRef;
use tracing::debug;

pub use self::package_json::*;
pub use self::specifier::*;

mod package_json;
mod specifier;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ResolverError {
  #[error("Could not resolve \"{specifier}\" from {}", from.display())]
  NotFound { specifier: String, from: PathBuf },

  #[error("Failed to read {}: {message}", path.display())]
  PackageJson { path: PathBuf, message: String },
}

/// Extensions probed when a specifier has none, in priority order
pub const DEFAULT_EXTENSIONS: [&str; 9] =
  ["tsx", "ts", "jsx", "js", "mjs", "cjs", "json", "css", "mdx"];

/// Resolves specifiers the way Node and browser bundlers do
///
/// Supports relative and absolute paths, `node_modules` packages (preferring the
/// `browser`, `module` and `main` fields in that order), extension and index probing
/// and prefix aliases such as `~ -> ./app`.
#[derive(Debug)]
pub struct Resolver {
  alias: BTreeMap<String, String>,
  extensions: Vec<String>,
  fs: FileSystemRef,
  packages: PackageJsonCache,
  project_root: PathBuf,
}

impl Resolver {
  pub fn new(fs: FileSystemRef, project_root: PathBuf) -> Self {
    Self {
      alias: BTreeMap::new(),
      extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
      packages: PackageJsonCache::new(fs.clone()),
      fs,
      project_root,
    }
  }

  /// Alias targets starting with `.` are relative to the project root
  pub fn with_alias(mut self, alias: BTreeMap<String, String>) -> Self {
    self.alias = alias;
    self
  }

  /// Drops cached package.json contents, for example before a rebuild
  pub fn invalidate(&self) {
    self.packages.clear();
  }

  pub fn resolve_path(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolverError> {
    let not_found = || ResolverError::NotFound {
      specifier: specifier.to_string(),
      from: from_dir.to_path_buf(),
    };

    let (aliased, from_dir) = match self.apply_alias(strip_suffix(specifier)) {
      Some(aliased) => (aliased, self.project_root.as_path()),
      None => (specifier.to_string(), from_dir),
    };

    let resolved = match Specifier::parse(&aliased) {
      Specifier::Relative(path) => self.resolve_file(&normalize_path(&from_dir.join(path)))?,
      Specifier::Absolute(path) => self.resolve_file(&normalize_path(&path))?,
      Specifier::Package(package, subpath) => self.resolve_package(&package, &subpath, from_dir)?,
    };

    let resolved = resolved.ok_or_else(not_found)?;
    debug!(specifier, resolved = %resolved.display(), "Resolved");

    Ok(resolved)
  }

  fn apply_alias(&self, specifier: &str) -> Option<String> {
    let (key, target) = self
      .alias
      .iter()
      .filter(|(key, _)| {
        specifier == key.as_str()
          || specifier
            .strip_prefix(key.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
      })
      .max_by_key(|(key, _)| key.len())?;

    let rest = &specifier[key.len()..];
    let target = if target.starts_with('.') {
      self
        .project_root
        .join(target)
        .to_string_lossy()
        .into_owned()
    } else {
      target.clone()
    };

    Some(format!("{target}{rest}"))
  }

  fn resolve_package(
    &self,
    package: &str,
    subpath: &str,
    from_dir: &Path,
  ) -> Result<Option<PathBuf>, ResolverError> {
    for dir in from_dir.ancestors() {
      let package_dir = dir.join("node_modules").join(package);
      if !self.fs.is_dir(&package_dir) {
        continue;
      }

      if !subpath.is_empty() {
        return self.resolve_file(&package_dir.join(subpath));
      }

      return self.resolve_directory(&package_dir);
    }

    Ok(None)
  }

  fn resolve_file(&self, path: &Path) -> Result<Option<PathBuf>, ResolverError> {
    if self.fs.is_file(path) {
      return Ok(Some(path.to_path_buf()));
    }

    if let Some(found) = self.probe_extensions(path) {
      return Ok(Some(found));
    }

    if self.fs.is_dir(path) {
      return self.resolve_directory(path);
    }

    Ok(None)
  }

  fn resolve_directory(&self, dir: &Path) -> Result<Option<PathBuf>, ResolverError> {
    let package_json_path = dir.join("package.json");
    if self.fs.is_file(&package_json_path) {
      let package = self.packages.read(&package_json_path)?;

      for entry in package.entries() {
        let entry = normalize_path(&entry);
        if self.fs.is_file(&entry) {
          return Ok(Some(entry));
        }

        if let Some(found) = self.probe_extensions(&entry) {
          return Ok(Some(found));
        }

        if self.fs.is_dir(&entry) {
          if let Some(found) = self.probe_extensions(&entry.join("index")) {
            return Ok(Some(found));
          }
        }
      }
    }

    Ok(self.probe_extensions(&dir.join("index")))
  }

  fn probe_extensions(&self, path: &Path) -> Option<PathBuf> {
    self.extensions.iter().find_map(|extension| {
      let mut candidate = path.as_os_str().to_os_string();
      candidate.push(".");
      candidate.push(extension);

      let candidate = PathBuf::from(candidate);
      self.fs.is_file(&candidate).then_some(candidate)
    })
  }
}

impl Resolve for Resolver {
  fn resolve(&self, specifier: &str, resolve_dir: &Path) -> anyhow::Result<PathBuf> {
    Ok(self.resolve_path(specifier, resolve_dir)?)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use pretty_assertions::assert_eq;
  use routepack_filesystem::in_memory_file_system::InMemoryFileSystem;

  use super::*;

  fn resolver() -> Resolver {
    let fs = InMemoryFileSystem::default();
    let write = |path: &str, contents: &str| {
      fs.write_file(Path::new(path), String::from(contents));
    };

    write("/app/app/root.tsx", "");
    write("/app/app/routes/index.tsx", "");
    write("/app/app/styles/button.module.css", "");
    write("/app/app/utils/index.ts", "");
    write(
      "/app/node_modules/react/package.json",
      r#"{ "name": "react", "main": "index.js" }"#,
    );
    write("/app/node_modules/react/index.js", "");
    write(
      "/app/node_modules/@remix-run/react/package.json",
      r#"{ "name": "@remix-run/react", "main": "dist/index.js", "module": "dist/esm/index.js" }"#,
    );
    write("/app/node_modules/@remix-run/react/dist/index.js", "");
    write("/app/node_modules/@remix-run/react/dist/esm/index.js", "");
    write(
      "/app/node_modules/cookie/package.json",
      r#"{ "name": "cookie", "main": "index.js", "browser": "browser.js" }"#,
    );
    write("/app/node_modules/cookie/index.js", "");
    write("/app/node_modules/cookie/browser.js", "");

    Resolver::new(Arc::new(fs), PathBuf::from("/app"))
      .with_alias(BTreeMap::from([(String::from("~"), String::from("./app"))]))
  }

  #[test]
  fn resolves_relative_paths_with_extension_probing() {
    let resolver = resolver();

    assert_eq!(
      resolver.resolve_path("../root", Path::new("/app/app/routes")),
      Ok(PathBuf::from("/app/app/root.tsx"))
    );
    assert_eq!(
      resolver.resolve_path("../utils", Path::new("/app/app/routes")),
      Ok(PathBuf::from("/app/app/utils/index.ts"))
    );
    assert_eq!(
      resolver.resolve_path("/app/app/routes/index?browser", Path::new("/")),
      Ok(PathBuf::from("/app/app/routes/index.tsx"))
    );
  }

  #[test]
  fn resolves_aliases_from_the_project_root() {
    assert_eq!(
      resolver().resolve_path("~/styles/button.module.css", Path::new("/elsewhere")),
      Ok(PathBuf::from("/app/app/styles/button.module.css"))
    );
  }

  #[test]
  fn resolves_packages_preferring_browser_then_module_fields() {
    let resolver = resolver();
    let from = Path::new("/app/app/routes");

    assert_eq!(
      resolver.resolve_path("react", from),
      Ok(PathBuf::from("/app/node_modules/react/index.js"))
    );
    assert_eq!(
      resolver.resolve_path("@remix-run/react", from),
      Ok(PathBuf::from("/app/node_modules/@remix-run/react/dist/esm/index.js"))
    );
    assert_eq!(
      resolver.resolve_path("cookie", from),
      Ok(PathBuf::from("/app/node_modules/cookie/browser.js"))
    );
    assert_eq!(
      resolver.resolve_path("@remix-run/react/dist/index", from),
      Ok(PathBuf::from("/app/node_modules/@remix-run/react/dist/index.js"))
    );
  }

  #[test]
  fn reports_unresolvable_specifiers() {
    assert_eq!(
      resolver().resolve_path("./missing", Path::new("/app/app")),
      Err(ResolverError::NotFound {
        specifier: String::from("./missing"),
        from: PathBuf::from("/app/app"),
      })
    );
  }
}
