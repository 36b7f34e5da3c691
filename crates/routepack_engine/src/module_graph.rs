use std::collections::HashMap;
use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use routepack_core::diagnostic::Diagnostic;
use routepack_core::diagnostic::DiagnosticBuilder;
use routepack_core::diagnostic::Diagnostics;
use routepack_core::diagnostic_error;
use routepack_core::engine::BuildOptions;
use routepack_core::lexer;
use routepack_core::plugin::LoadArgs;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginData;
use routepack_core::plugin::PluginRegistry;
use routepack_core::plugin::ResolveArgs;
use routepack_core::plugin::ResolveKind;
use routepack_core::plugin::ResolveResult;
use routepack_core::plugin::FILE_NAMESPACE;
use routepack_core::types::Loader;
use routepack_resolver::Resolver;
use routepack_resolver::Specifier;
use tracing::debug;

use crate::cache::EngineCache;
use crate::css;

#[derive(Clone, Debug, PartialEq)]
pub enum ImportTarget {
  Module(usize),
  External(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleImport {
  pub specifier: String,
  pub kind: ResolveKind,
  /// Byte range of the statement or `url()` argument in the module source
  pub span: Range<usize>,
  pub target: ImportTarget,
}

#[derive(Clone, Debug)]
pub struct Module {
  /// Key used in the metafile, relative to the working directory
  pub key: String,
  pub namespace: String,
  pub path: String,
  pub loader: Loader,
  pub source: Vec<u8>,
  pub resolve_dir: PathBuf,
  pub plugin_data: Option<PluginData>,
  pub imports: Vec<ModuleImport>,
}

impl Module {
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.source).into_owned()
  }

  /// The on-disk path of the module, when it has one
  pub fn file_path(&self) -> Option<&Path> {
    let path = Path::new(&self.path);
    path.is_absolute().then_some(path)
  }
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
  pub modules: Vec<Module>,
  /// Entry name and module index, in entry point order
  pub entries: Vec<(String, usize)>,
}

/// Walks the module graph from the entry points, running plugin stages first
pub struct GraphBuilder<'a> {
  cache: &'a EngineCache,
  ctx: &'a PluginContext,
  graph: ModuleGraph,
  index: HashMap<String, usize>,
  options: &'a BuildOptions,
  registry: &'a PluginRegistry,
  resolver: &'a Resolver,
}

impl<'a> GraphBuilder<'a> {
  pub fn new(
    options: &'a BuildOptions,
    ctx: &'a PluginContext,
    registry: &'a PluginRegistry,
    resolver: &'a Resolver,
    cache: &'a EngineCache,
  ) -> Self {
    Self {
      cache,
      ctx,
      graph: ModuleGraph::default(),
      index: HashMap::new(),
      options,
      registry,
      resolver,
    }
  }

  /// Builds the graph, collecting every resolve and load failure
  pub async fn build(mut self) -> Result<ModuleGraph, Diagnostics> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut queue = VecDeque::new();

    for (name, locator) in &self.options.entry_points {
      let args = ResolveArgs {
        path: locator.clone(),
        importer: None,
        namespace: String::from(FILE_NAMESPACE),
        resolve_dir: self.options.abs_working_dir.clone(),
        kind: ResolveKind::EntryPoint,
        plugin_data: None,
      };

      let resolved = match self.resolve(&args).await {
        Ok(resolved) if resolved.external => {
          diagnostics.push(Diagnostic {
            message: format!("Entry point {name} ({locator}) cannot be external"),
            ..Diagnostic::default()
          });
          continue;
        }
        Ok(resolved) => resolved,
        Err(error) => {
          diagnostics.extend(Diagnostics::from_error(error).into_inner());
          continue;
        }
      };

      match self.add_module(&resolved, &mut queue).await {
        Ok(index) => self.graph.entries.push((name.clone(), index)),
        Err(error) => diagnostics.extend(Diagnostics::from_error(error).into_inner()),
      }
    }

    while let Some(index) = queue.pop_front() {
      if let Err(errors) = self.link_imports(index, &mut queue).await {
        diagnostics.extend(errors);
      }
    }

    if !diagnostics.is_empty() {
      return Err(Diagnostics::from(diagnostics));
    }

    Ok(self.graph)
  }

  async fn link_imports(
    &mut self,
    index: usize,
    queue: &mut VecDeque<usize>,
  ) -> Result<(), Vec<Diagnostic>> {
    let module = &self.graph.modules[index];
    let scanned = self.scan_imports(module);
    let importer = module.key.clone();
    let namespace = module.namespace.clone();
    let resolve_dir = module.resolve_dir.clone();
    let plugin_data = module.plugin_data.clone();

    let mut imports = Vec::with_capacity(scanned.len());
    let mut errors = Vec::new();

    for (specifier, kind, span) in scanned {
      let args = ResolveArgs {
        path: specifier.clone(),
        importer: Some(importer.clone()),
        namespace: namespace.clone(),
        resolve_dir: resolve_dir.clone(),
        kind,
        plugin_data: plugin_data.clone(),
      };

      let target = match self.resolve(&args).await {
        Ok(resolved) if resolved.external => Ok(ImportTarget::External(resolved.path)),
        Ok(resolved) => self
          .add_module(&resolved, queue)
          .await
          .map(ImportTarget::Module),
        Err(error) => Err(error),
      };

      match target {
        Ok(target) => imports.push(ModuleImport {
          specifier,
          kind,
          span,
          target,
        }),
        Err(error) => errors.extend(Diagnostics::from_error(error).into_inner()),
      }
    }

    self.graph.modules[index].imports = imports;

    if errors.is_empty() {
      Ok(())
    } else {
      Err(errors)
    }
  }

  fn scan_imports(&self, module: &Module) -> Vec<(String, ResolveKind, Range<usize>)> {
    if module.loader.is_script() {
      let text = module.text();
      return self
        .cache
        .script_imports(&text, || lexer::imports(&text))
        .into_iter()
        .map(|record| (record.specifier, record.kind.into(), record.span))
        .collect();
    }

    if module.loader == Loader::Css {
      return css::imports(&module.text())
        .into_iter()
        .map(|reference| (reference.specifier, reference.kind, reference.span))
        .collect();
    }

    Vec::new()
  }

  async fn resolve(&self, args: &ResolveArgs) -> anyhow::Result<ResolveResult> {
    if let Some(resolved) = self.registry.resolve(self.ctx, args).await? {
      return Ok(resolved);
    }

    if self.is_external(&args.path) {
      return Ok(ResolveResult::external(args.path.clone()));
    }

    let path = self
      .resolver
      .resolve_path(&args.path, &args.resolve_dir)
      .map_err(|error| {
        diagnostic_error!(DiagnosticBuilder::default()
          .message(format!(
            "Could not resolve \"{}\" from {}",
            args.path,
            args.importer.as_deref().unwrap_or("<entry>")
          ))
          .hints(vec![error.to_string()]))
      })?;

    Ok(ResolveResult::file(path))
  }

  fn is_external(&self, specifier: &str) -> bool {
    let specifier = specifier.strip_prefix("node:").unwrap_or(specifier);

    match Specifier::parse(specifier) {
      Specifier::Package(package, _) => self.options.external.contains(&package),
      _ => self.options.external.contains(specifier),
    }
  }

  async fn add_module(
    &mut self,
    resolved: &ResolveResult,
    queue: &mut VecDeque<usize>,
  ) -> anyhow::Result<usize> {
    let key = module_key(
      &self.options.abs_working_dir,
      &resolved.namespace,
      &resolved.path,
    );

    if let Some(index) = self.index.get(&key) {
      return Ok(*index);
    }

    let module = self.load(key.clone(), resolved).await?;
    debug!(module = %key, loader = ?module.loader, "Loaded module");

    let index = self.graph.modules.len();
    self.graph.modules.push(module);
    self.index.insert(key, index);
    queue.push_back(index);

    Ok(index)
  }

  async fn load(&self, key: String, resolved: &ResolveResult) -> anyhow::Result<Module> {
    let args = LoadArgs {
      path: resolved.path.clone(),
      namespace: resolved.namespace.clone(),
      plugin_data: resolved.plugin_data.clone(),
    };

    let default_resolve_dir = Path::new(&resolved.path)
      .parent()
      .filter(|_| Path::new(&resolved.path).is_absolute())
      .map(Path::to_path_buf)
      .unwrap_or_else(|| self.options.abs_working_dir.clone());

    if let Some(loaded) = self.registry.load(self.ctx, &args).await? {
      return Ok(Module {
        key,
        namespace: resolved.namespace.clone(),
        path: resolved.path.clone(),
        loader: loaded.loader,
        source: loaded.contents.into_bytes(),
        resolve_dir: loaded.resolve_dir.unwrap_or(default_resolve_dir),
        plugin_data: loaded.plugin_data,
        imports: Vec::new(),
      });
    }

    if resolved.namespace != FILE_NAMESPACE {
      return Err(diagnostic_error!(
        "No plugin loaded {key}, modules in the {} namespace need a load stage",
        resolved.namespace
      ));
    }

    let path = PathBuf::from(&resolved.path);
    let extension = path
      .extension()
      .map(|extension| extension.to_string_lossy().to_lowercase())
      .unwrap_or_default();

    let loader = self
      .options
      .loader
      .get(&extension)
      .copied()
      .or_else(|| Loader::from_extension(&extension))
      .ok_or_else(|| {
        diagnostic_error!(DiagnosticBuilder::default()
          .message(format!("No loader is configured for \".{extension}\" files: {key}"))
          .hints(vec![String::from(
            "Add the extension to the loader table or handle it with a plugin"
          )]))
      })?;

    let source = self
      .ctx
      .file_system
      .read(&path)
      .map_err(|error| diagnostic_error!("Failed to read {}: {}", path.display(), error))?;

    Ok(Module {
      key,
      namespace: resolved.namespace.clone(),
      path: resolved.path.clone(),
      loader,
      source,
      resolve_dir: default_resolve_dir,
      plugin_data: resolved.plugin_data.clone(),
      imports: Vec::new(),
    })
  }
}

/// Metafile key of a module: working directory relative, prefixed with non-file namespaces
pub fn module_key(working_dir: &Path, namespace: &str, path: &str) -> String {
  let display = if Path::new(path).is_absolute() {
    to_slash(Path::new(path).strip_prefix(working_dir).unwrap_or(Path::new(path)))
  } else {
    path.to_string()
  };

  if namespace == FILE_NAMESPACE {
    display
  } else {
    format!("{namespace}:{display}")
  }
}

pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
    .replace("//", "/")
}
