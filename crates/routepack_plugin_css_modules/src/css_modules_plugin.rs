use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use routepack_core::diagnostic::CodeFrame;
use routepack_core::diagnostic::DiagnosticBuilder;
use routepack_core::diagnostic_error;
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

use crate::ScopedStyleTransform;
use crate::PLUGIN_NAME;

/// Namespace of scoped stylesheets, whose modules are the generated JS bindings
pub const CSS_MODULES_NAMESPACE: &str = "css-modules";

/// Namespace and query suffix of the compiled CSS of a scoped stylesheet
pub const PAYLOAD_NAMESPACE: &str = "css-modules-payload";
pub const PAYLOAD_SUFFIX: &str = "?css-modules-payload";

/// Compiled CSS waiting for the engine to load its payload module
#[derive(Clone, Debug, PartialEq)]
pub struct PassThrough {
  pub resolve_dir: PathBuf,
  pub css: String,
}

/// Pass-through records keyed by payload module id
///
/// The binding stage inserts, the payload stage removes. Each record is read once.
#[derive(Debug, Default)]
pub struct PassThroughTable {
  records: Mutex<HashMap<String, PassThrough>>,
}

impl PassThroughTable {
  pub fn insert(&self, id: String, record: PassThrough) {
    self.records.lock().insert(id, record);
  }

  pub fn take(&self, id: &str) -> Option<PassThrough> {
    self.records.lock().remove(id)
  }

  pub fn len(&self) -> usize {
    self.records.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Compiles `*.module.css` imports into a JS binding plus a CSS payload module
///
/// 1. `./button.module.css` resolves through the default resolver into the
///    `css-modules` namespace.
/// 2. Loading it compiles the stylesheet, stores the CSS in the pass-through table and
///    returns `import "./button.module.css?css-modules-payload"; export default {...}`.
/// 3. The payload import resolves into the `css-modules-payload` namespace.
/// 4. Loading the payload hands the stored CSS to the engine's CSS loader.
///
/// Every build needs its own instance so concurrent builds never share records.
///
/// A [`CssModulesPlugin::bindings_only`] instance stops after step 2 without the payload
/// import, for builds whose stylesheets are collected by another build.
#[derive(Debug)]
pub struct CssModulesPlugin {
  emit_css: bool,
  table: Arc<PassThroughTable>,
}

impl Default for CssModulesPlugin {
  fn default() -> Self {
    Self::new()
  }
}

impl CssModulesPlugin {
  pub fn new() -> Self {
    Self {
      emit_css: true,
      table: Arc::default(),
    }
  }

  /// Produces the name mappings but no CSS
  pub fn bindings_only() -> Self {
    Self {
      emit_css: false,
      ..Self::new()
    }
  }

  pub fn emits_css(&self) -> bool {
    self.emit_css
  }

  pub fn table(&self) -> Arc<PassThroughTable> {
    self.table.clone()
  }
}

impl Plugin for CssModulesPlugin {
  fn name(&self) -> &str {
    PLUGIN_NAME
  }

  fn setup(&self, build: &mut PluginRegistry) -> anyhow::Result<()> {
    build.on_resolve(r"\.module\.css$", None, Arc::new(ResolveScopedStylesheet))?;
    build.on_load(
      r".*",
      Some(CSS_MODULES_NAMESPACE),
      Arc::new(LoadScopedStylesheet {
        emit_css: self.emit_css,
        table: self.table.clone(),
      }),
    )?;

    if !self.emit_css {
      return Ok(());
    }

    build.on_resolve(
      r"\?css-modules-payload$",
      Some(CSS_MODULES_NAMESPACE),
      Arc::new(ResolvePayload),
    )?;
    build.on_load(
      r".*",
      Some(PAYLOAD_NAMESPACE),
      Arc::new(LoadPayload {
        table: self.table.clone(),
      }),
    )
  }
}

struct ResolveScopedStylesheet;

#[async_trait]
impl OnResolve for ResolveScopedStylesheet {
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    let path = ctx.resolve(&args.path, &args.resolve_dir).map_err(|error| {
      diagnostic_error!(DiagnosticBuilder::default()
        .message(format!(
          "Could not resolve \"{}\" from {}",
          args.path,
          args.importer.as_deref().unwrap_or("<entry>")
        ))
        .origin(Some(String::from(PLUGIN_NAME)))
        .hints(vec![error.to_string()]))
    })?;

    Ok(Some(ResolveResult::virtual_module(
      CSS_MODULES_NAMESPACE,
      path.to_string_lossy(),
    )))
  }
}

struct LoadScopedStylesheet {
  emit_css: bool,
  table: Arc<PassThroughTable>,
}

#[async_trait]
impl OnLoad for LoadScopedStylesheet {
  async fn on_load(
    &self,
    ctx: &PluginContext,
    args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    let path = PathBuf::from(&args.path);
    let resolve_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let code = ctx.file_system.read_to_string(&path).map_err(|error| {
      diagnostic_error!(DiagnosticBuilder::default()
        .message(format!("Failed to read {}: {error}", path.display()))
        .origin(Some(String::from(PLUGIN_NAME)))
        .code_frames(vec![CodeFrame::from(path.clone())]))
    })?;

    let stylesheet = ScopedStyleTransform::new(ctx).transform(&path, &code)?;

    let mut contents = String::new();
    for dependency in &stylesheet.dependencies {
      contents += &format!("import {};\n", serde_json::to_string(dependency)?);
    }

    if self.emit_css {
      let payload_id = format!("{}{PAYLOAD_SUFFIX}", ctx.relative_path(&path));
      self.table.insert(
        payload_id.clone(),
        PassThrough {
          resolve_dir: resolve_dir.clone(),
          css: stylesheet.css,
        },
      );

      let base_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

      contents += &format!(
        "import {};\n",
        serde_json::to_string(&format!("./{base_name}{PAYLOAD_SUFFIX}"))?
      );

      debug!(payload = %payload_id, "Stored compiled stylesheet");
    }

    contents += &format!(
      "export default {};\n",
      serde_json::to_string(&stylesheet.mapping)?
    );

    Ok(Some(LoadResult {
      contents,
      loader: Loader::Js,
      resolve_dir: Some(resolve_dir),
      plugin_data: None,
    }))
  }
}

struct ResolvePayload;

#[async_trait]
impl OnResolve for ResolvePayload {
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    let path = ctx.relative_path(&args.resolve_dir.join(&args.path));

    Ok(Some(ResolveResult {
      plugin_data: args.plugin_data.clone(),
      ..ResolveResult::virtual_module(PAYLOAD_NAMESPACE, path)
    }))
  }
}

struct LoadPayload {
  table: Arc<PassThroughTable>,
}

#[async_trait]
impl OnLoad for LoadPayload {
  async fn on_load(
    &self,
    _ctx: &PluginContext,
    args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    let record = self.table.take(&args.path).ok_or_else(|| {
      diagnostic_error!(DiagnosticBuilder::default()
        .message(format!("No compiled stylesheet is waiting for {}", args.path))
        .origin(Some(String::from(PLUGIN_NAME)))
        .hints(vec![String::from(
          "Compiled stylesheets are handed over once; import the stylesheet module instead of its payload"
        )]))
    })?;

    Ok(Some(LoadResult {
      contents: record.css,
      loader: Loader::Css,
      resolve_dir: Some(record.resolve_dir),
      plugin_data: args.plugin_data.clone(),
    }))
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use routepack_core::plugin::PluginRef;
  use routepack_core::plugin::ResolveKind;
  use routepack_core::plugin::FILE_NAMESPACE;
  use routepack_core::types::BuildMode;
  use routepack_filesystem::in_memory_file_system::InMemoryFileSystem;
  use routepack_resolver::Resolver;
  use serde_json::json;

  use super::*;

  fn setup() -> (PluginRegistry, PluginContext, Arc<PassThroughTable>) {
    let fs = Arc::new(InMemoryFileSystem::default());
    fs.write_file(
      Path::new("/app/app/routes/index.module.css"),
      String::from(".title { color: red; }"),
    );

    let plugin = CssModulesPlugin::new();
    let table = plugin.table();
    let plugins: Vec<PluginRef> = vec![Arc::new(plugin)];

    let resolver = Resolver::new(fs.clone(), PathBuf::from("/app"));
    let ctx = PluginContext::new(
      fs,
      Arc::new(resolver),
      PathBuf::from("/app"),
      BuildMode::Production,
    );

    (PluginRegistry::new(&plugins).unwrap(), ctx, table)
  }

  fn resolve_args(path: &str, namespace: &str, resolve_dir: &str) -> ResolveArgs {
    ResolveArgs {
      path: String::from(path),
      importer: Some(String::from("/app/app/routes/index.tsx")),
      namespace: String::from(namespace),
      resolve_dir: PathBuf::from(resolve_dir),
      kind: ResolveKind::ImportStatement,
      plugin_data: Some(json!({ "route": "index" })),
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn hands_compiled_css_from_the_binding_to_the_payload() {
    let (registry, ctx, table) = setup();

    let resolved = registry
      .resolve(
        &ctx,
        &resolve_args("./index.module.css", FILE_NAMESPACE, "/app/app/routes"),
      )
      .await
      .unwrap()
      .unwrap();

    assert_eq!(
      resolved,
      ResolveResult::virtual_module(CSS_MODULES_NAMESPACE, "/app/app/routes/index.module.css")
    );

    let binding = registry
      .load(
        &ctx,
        &LoadArgs {
          path: resolved.path,
          namespace: resolved.namespace,
          plugin_data: None,
        },
      )
      .await
      .unwrap()
      .unwrap();

    assert_eq!(binding.loader, Loader::Js);
    assert_eq!(binding.resolve_dir, Some(PathBuf::from("/app/app/routes")));
    assert!(binding
      .contents
      .starts_with("import \"./index.module.css?css-modules-payload\";\nexport default {\"title\":\""));
    assert_eq!(table.len(), 1);

    let payload = registry
      .resolve(
        &ctx,
        &resolve_args(
          "./index.module.css?css-modules-payload",
          CSS_MODULES_NAMESPACE,
          "/app/app/routes",
        ),
      )
      .await
      .unwrap()
      .unwrap();

    assert_eq!(payload.namespace, PAYLOAD_NAMESPACE);
    assert_eq!(payload.path, "app/routes/index.module.css?css-modules-payload");
    assert_eq!(payload.plugin_data, Some(json!({ "route": "index" })));

    let payload_args = LoadArgs {
      path: payload.path,
      namespace: payload.namespace,
      plugin_data: payload.plugin_data,
    };

    let css = registry.load(&ctx, &payload_args).await.unwrap().unwrap();

    assert_eq!(css.loader, Loader::Css);
    assert_eq!(css.resolve_dir, Some(PathBuf::from("/app/app/routes")));
    assert!(css.contents.contains("color: red"));
    assert!(table.is_empty());

    let error = registry.load(&ctx, &payload_args).await.unwrap_err();
    assert_eq!(
      error.to_string(),
      "No compiled stylesheet is waiting for app/routes/index.module.css?css-modules-payload"
    );
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn bindings_only_instances_emit_no_css() {
    let fs = Arc::new(InMemoryFileSystem::default());
    fs.write_file(
      Path::new("/app/app/routes/index.module.css"),
      String::from(".title { color: red; }"),
    );

    let plugin = CssModulesPlugin::bindings_only();
    let table = plugin.table();
    assert!(!plugin.emits_css());
    let plugins: Vec<PluginRef> = vec![Arc::new(plugin)];
    let registry = PluginRegistry::new(&plugins).unwrap();
    let ctx = PluginContext::new(
      fs.clone(),
      Arc::new(Resolver::new(fs, PathBuf::from("/app"))),
      PathBuf::from("/app"),
      BuildMode::Production,
    );

    let binding = registry
      .load(
        &ctx,
        &LoadArgs {
          path: String::from("/app/app/routes/index.module.css"),
          namespace: String::from(CSS_MODULES_NAMESPACE),
          plugin_data: None,
        },
      )
      .await
      .unwrap()
      .unwrap();

    assert!(binding.contents.starts_with("export default {\"title\":\""));
    assert!(!binding.contents.contains(PAYLOAD_SUFFIX));
    assert!(table.is_empty());

    let payload = registry
      .resolve(
        &ctx,
        &resolve_args(
          "./index.module.css?css-modules-payload",
          CSS_MODULES_NAMESPACE,
          "/app/app/routes",
        ),
      )
      .await
      .unwrap();
    assert_eq!(payload, None);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn unresolvable_stylesheets_fail_to_resolve() {
    let (registry, ctx, _) = setup();

    let error = registry
      .resolve(
        &ctx,
        &resolve_args("./missing.module.css", FILE_NAMESPACE, "/app/app/routes"),
      )
      .await
      .unwrap_err();

    assert_eq!(
      error.to_string(),
      "Could not resolve \"./missing.module.css\" from /app/app/routes/index.tsx"
    );
  }
}
