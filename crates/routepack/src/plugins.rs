//! Resolve and load stages that shape routepack's browser builds.
use std::path::PathBuf;
use std::sync::Arc;

use routepack_core::diagnostic::DiagnosticBuilder;
use routepack_core::diagnostic_error;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginRef;
use routepack_core::plugin::ResolveArgs;

pub use browser_route_module::*;
pub use css_bundle_entry::*;
pub use plain_stylesheet::*;
pub use server_only_stub::*;
pub use url_import::*;

mod browser_route_module;
mod css_bundle_entry;
mod plain_stylesheet;
mod server_only_stub;
mod url_import;

/// Creates a fresh plugin instance for every build target
pub type PluginFactory = Arc<dyn Fn() -> PluginRef + Send + Sync>;

/// Plugins supplied by the embedding application
#[derive(Clone, Default)]
pub struct ExtensionPlugins {
  /// Compiles markup extension modules such as `.mdx`
  pub markup: Option<PluginFactory>,
  /// Resolution shims and polyfills, consulted last
  pub shims: Option<PluginFactory>,
}

impl std::fmt::Debug for ExtensionPlugins {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExtensionPlugins")
      .field("markup", &self.markup.is_some())
      .field("shims", &self.shims.is_some())
      .finish()
  }
}

/// Runs the default resolver for a specifier a stage has claimed
fn resolve_claimed(
  ctx: &PluginContext,
  args: &ResolveArgs,
  specifier: &str,
  plugin: &str,
) -> anyhow::Result<PathBuf> {
  ctx.resolve(specifier, &args.resolve_dir).map_err(|error| {
    diagnostic_error!(DiagnosticBuilder::default()
      .message(format!(
        "Could not resolve \"{}\" from {}",
        args.path,
        args.importer.as_deref().unwrap_or("<entry>")
      ))
      .origin(Some(String::from(plugin)))
      .hints(vec![error.to_string()]))
  })
}

#[cfg(test)]
pub(crate) mod test_utils {
  use std::path::Path;
  use std::path::PathBuf;
  use std::sync::Arc;

  use routepack_core::plugin::MockResolve;
  use routepack_core::plugin::PluginContext;
  use routepack_core::plugin::ResolveArgs;
  use routepack_core::plugin::ResolveKind;
  use routepack_core::plugin::FILE_NAMESPACE;
  use routepack_core::types::BuildMode;
  use routepack_filesystem::in_memory_file_system::InMemoryFileSystem;

  /// A context whose resolver joins relative specifiers onto the resolve dir
  pub fn plugin_context(fs: InMemoryFileSystem) -> PluginContext {
    let mut resolver = MockResolve::new();
    resolver.expect_resolve().returning(|specifier, resolve_dir| {
      let path = resolve_dir.join(specifier.trim_start_matches("./"));
      if specifier.contains("missing") {
        anyhow::bail!("{} does not exist", path.display());
      }
      Ok(path)
    });

    PluginContext::new(
      Arc::new(fs),
      Arc::new(resolver),
      PathBuf::from("/app"),
      BuildMode::Production,
    )
  }

  pub fn import_args(path: &str, resolve_dir: &Path) -> ResolveArgs {
    ResolveArgs {
      path: path.to_string(),
      importer: Some(String::from("app/root.tsx")),
      namespace: String::from(FILE_NAMESPACE),
      resolve_dir: resolve_dir.to_path_buf(),
      kind: ResolveKind::ImportStatement,
      plugin_data: None,
    }
  }
}
