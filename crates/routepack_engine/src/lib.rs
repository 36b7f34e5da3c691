//! An in-process engine that honours the routepack engine contracts.
//!
//! Modules are concatenated in dependency order rather than linked, which is enough to
//! exercise plugins, naming, code splitting, stylesheet collection and metafiles without
//! a full JavaScript toolchain.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use routepack_core::diagnostic_error;
use routepack_core::engine::BuildHandle;
use routepack_core::engine::BuildOptions;
use routepack_core::engine::BuildResult;
use routepack_core::engine::Engine;
use routepack_core::plugin::PluginContext;
use routepack_core::plugin::PluginRegistry;
use routepack_filesystem::write_file;
use routepack_filesystem::FileSystemRef;
use routepack_resolver::Resolver;
use tracing::info;

pub use cache::CacheStats;
pub use cache::EngineCache;

mod cache;
mod chunks;
mod css;
mod module_graph;
mod output;

use chunks::split_chunks;
use module_graph::GraphBuilder;
use output::Renderer;

#[derive(Debug)]
pub struct RoutepackEngine {
  file_system: FileSystemRef,
}

impl RoutepackEngine {
  pub fn new(file_system: FileSystemRef) -> Self {
    Self { file_system }
  }
}

#[async_trait]
impl Engine for RoutepackEngine {
  async fn build(&self, options: BuildOptions) -> anyhow::Result<Box<dyn BuildHandle>> {
    let cache = Arc::new(EngineCache::default());
    let result = run_build(&self.file_system, &options, &cache).await?;

    Ok(Box::new(EngineBuildHandle {
      cache,
      disposed: AtomicBool::new(false),
      file_system: self.file_system.clone(),
      options,
      result,
    }))
  }
}

/// Keeps the options and content cache of a build around for rebuilds
pub struct EngineBuildHandle {
  cache: Arc<EngineCache>,
  disposed: AtomicBool,
  file_system: FileSystemRef,
  options: BuildOptions,
  result: BuildResult,
}

impl EngineBuildHandle {
  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }
}

#[async_trait]
impl BuildHandle for EngineBuildHandle {
  fn result(&self) -> &BuildResult {
    &self.result
  }

  async fn rebuild(&self) -> anyhow::Result<Box<dyn BuildHandle>> {
    if !self.options.incremental {
      return Err(diagnostic_error!(
        "Cannot rebuild a build that was not started with incremental enabled"
      ));
    }

    if self.disposed.load(Ordering::SeqCst) {
      return Err(diagnostic_error!("Cannot rebuild a disposed build"));
    }

    let result = run_build(&self.file_system, &self.options, &self.cache).await?;

    Ok(Box::new(EngineBuildHandle {
      cache: self.cache.clone(),
      disposed: AtomicBool::new(false),
      file_system: self.file_system.clone(),
      options: self.options.clone(),
      result,
    }))
  }

  fn dispose(&self) {
    self.disposed.store(true, Ordering::SeqCst);
    self.cache.clear();
  }
}

#[tracing::instrument(level = "info", skip_all, fields(entries = options.entry_points.len()))]
async fn run_build(
  file_system: &FileSystemRef,
  options: &BuildOptions,
  cache: &EngineCache,
) -> anyhow::Result<BuildResult> {
  let start = Instant::now();

  let registry = PluginRegistry::new(&options.plugins)?;
  let resolver = Arc::new(
    Resolver::new(file_system.clone(), options.abs_working_dir.clone())
      .with_alias(options.alias.clone()),
  );
  let ctx = PluginContext::new(
    file_system.clone(),
    resolver.clone(),
    options.abs_working_dir.clone(),
    options.mode,
  );

  let graph = GraphBuilder::new(options, &ctx, &registry, &resolver, cache)
    .build()
    .await
    .map_err(anyhow::Error::new)?;

  let chunks = split_chunks(&graph, options.splitting);
  let rendered = Renderer::new(options, &graph, cache)?.render(&chunks)?;

  if options.write {
    for output in &rendered.output_files {
      write_file(file_system.as_ref(), &output.path, &output.contents)?;
    }
  }

  info!(
    modules = graph.modules.len(),
    outputs = rendered.output_files.len(),
    written = options.write,
    "Built in {:?}",
    start.elapsed()
  );

  Ok(BuildResult {
    metafile: options.metafile.then_some(rendered.metafile),
    output_files: rendered.output_files,
    warnings: rendered.warnings,
  })
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::path::Path;
  use std::path::PathBuf;

  use indexmap::IndexMap;
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use routepack_core::diagnostic::Diagnostics;
  use routepack_core::engine::OutputFile;
  use routepack_core::types::BuildMode;
  use routepack_filesystem::in_memory_file_system::InMemoryFileSystem;
  use routepack_filesystem::FileSystem;

  use super::*;

  fn file_system() -> Arc<InMemoryFileSystem> {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(Path::new("/app"));

    fs.write_file(
      Path::new("/app/app/entry.client.tsx"),
      String::from(indoc! {r#"
        import { hydrate } from "./lib/react";
        import "./root.css";
        hydrate(process.env.NODE_ENV);
      "#}),
    );
    fs.write_file(
      Path::new("/app/app/routes/index.tsx"),
      String::from(indoc! {r#"
        import { hydrate } from "../lib/react";
        export const meta = () => ({ title: "Home" });
        export default function Index() { return hydrate; }
      "#}),
    );
    fs.write_file(
      Path::new("/app/app/lib/react.js"),
      String::from("export function hydrate(value) { return value; }\n"),
    );
    fs.write_file(
      Path::new("/app/app/root.css"),
      String::from(indoc! {r#"
        @import "./reset.css";
        .logo { background: url("./logo.svg"); }
      "#}),
    );
    fs.write_file(
      Path::new("/app/app/reset.css"),
      String::from("* { margin: 0 }\n"),
    );
    fs.write_file(Path::new("/app/app/logo.svg"), String::from("<svg></svg>"));

    Arc::new(fs)
  }

  fn options() -> BuildOptions {
    BuildOptions {
      entry_points: IndexMap::from([
        (
          String::from("entry.client"),
          String::from("./app/entry.client.tsx"),
        ),
        (
          String::from("routes/index"),
          String::from("./app/routes/index.tsx"),
        ),
      ]),
      abs_working_dir: PathBuf::from("/app"),
      outdir: PathBuf::from("/app/public/build"),
      public_path: String::from("/build/"),
      entry_names: String::from("[dir]/[name]-[hash]"),
      chunk_names: String::from("_shared/[name]-[hash]"),
      asset_names: String::from("_assets/[name]-[hash]"),
      define: BTreeMap::from([(
        String::from("process.env.NODE_ENV"),
        String::from("\"production\""),
      )]),
      minify: true,
      metafile: true,
      incremental: true,
      mode: BuildMode::Production,
      ..BuildOptions::default()
    }
  }

  fn output_names(outputs: &[OutputFile]) -> Vec<String> {
    let mut names = outputs
      .iter()
      .map(|output| {
        let path = output.path.strip_prefix("/app/public/build").unwrap();
        let path = path.to_string_lossy();
        // Drop the content hash so assertions stay readable
        let (head, tail) = path.rsplit_once('-').unwrap();
        let (_, extension) = tail.split_once('.').unwrap();
        format!("{head}.{extension}")
      })
      .collect::<Vec<_>>();

    names.sort();
    names
  }

  fn output<'r>(result: &'r BuildResult, prefix: &str, suffix: &str) -> &'r OutputFile {
    result
      .output_files
      .iter()
      .find(|output| {
        output
          .path
          .to_string_lossy()
          .starts_with(&format!("/app/public/build/{prefix}"))
          && output.has_extension(suffix)
      })
      .unwrap()
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn builds_hashed_entries_with_metafile() {
    let fs = file_system();
    let engine = RoutepackEngine::new(fs.clone());

    let handle = engine.build(options()).await.unwrap();
    let result = handle.result();

    assert_eq!(
      output_names(&result.output_files),
      vec![
        "_assets/logo.svg",
        "entry.client.css",
        "entry.client.js",
        "routes/index.js",
      ]
    );

    let entry = output(result, "entry.client-", ".js").text();
    assert!(entry.contains("hydrate(\"production\");"));
    assert!(entry.contains("/* bundled \"./lib/react\" */"));
    assert!(!entry.contains("// app/lib/react.js"));
    assert!(entry.contains("export function hydrate"));

    let css = output(result, "entry.client-", ".css").text();
    assert!(css.contains("margin:0"));
    assert!(css.contains("/build/_assets/logo-"));
    assert!(!css.contains("@import"));

    let metafile = result.metafile.as_ref().unwrap();
    let (_, route) = metafile.entry_output("routes/index").unwrap();
    assert_eq!(route.entry_point.as_deref(), Some("app/routes/index.tsx"));
    assert_eq!(route.exports, vec!["meta", "default"]);

    let (_, client) = metafile.entry_output("entry.client").unwrap();
    assert!(client
      .css_bundle
      .as_deref()
      .is_some_and(|css| css.starts_with("public/build/entry.client-") && css.ends_with(".css")));

    assert!(fs.files().iter().all(|path| !path.starts_with("/app/public")));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn splitting_moves_shared_modules_into_a_shared_chunk() {
    let engine = RoutepackEngine::new(file_system());

    let handle = engine
      .build(BuildOptions {
        splitting: true,
        ..options()
      })
      .await
      .unwrap();

    let result = handle.result();
    let shared = output(result, "_shared/chunk-", ".js").text();
    let route = output(result, "routes/index-", ".js").text();

    assert!(shared.contains("export function hydrate"));
    assert!(!route.contains("export function hydrate"));
    assert!(route.starts_with("import \"../_shared/chunk-"));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn writes_outputs_and_linked_source_maps() {
    let fs = file_system();
    let engine = RoutepackEngine::new(fs.clone());

    let handle = engine
      .build(BuildOptions {
        write: true,
        minify: false,
        sourcemap: true,
        mode: BuildMode::Development,
        ..options()
      })
      .await
      .unwrap();

    let result = handle.result();
    let css = output(result, "entry.client-", ".css");
    let map = output(result, "entry.client-", ".css.map");

    let map_name = map.path.file_name().unwrap().to_string_lossy();

    assert!(css.text().contains(".logo { background: url(\"/build/_assets/logo-"));
    assert!(css
      .text()
      .ends_with(&format!("/*# sourceMappingURL={map_name} */\n")));
    assert!(map.text().contains("root.css"));

    for output in &result.output_files {
      assert_eq!(fs.read(&output.path).unwrap(), output.contents);
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn reports_every_unresolved_import() {
    let fs = file_system();
    fs.write_file(
      Path::new("/app/app/routes/index.tsx"),
      String::from("import \"./missing\";\nimport \"./gone.css\";\n"),
    );

    let engine = RoutepackEngine::new(fs);
    let error = engine.build(options()).await.err().unwrap();
    let diagnostics = Diagnostics::from_error(error);

    assert_eq!(
      diagnostics
        .as_ref()
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect::<Vec<_>>(),
      vec![
        String::from("Could not resolve \"./missing\" from app/routes/index.tsx"),
        String::from("Could not resolve \"./gone.css\" from app/routes/index.tsx"),
      ]
    );
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn keeps_externals_as_imports() {
    let fs = file_system();
    fs.write_file(
      Path::new("/app/app/routes/index.tsx"),
      String::from("import path from \"node:path\";\nexport default path;\n"),
    );

    let engine = RoutepackEngine::new(fs);
    let handle = engine
      .build(BuildOptions {
        external: ["path".to_string()].into(),
        ..options()
      })
      .await
      .unwrap();

    let result = handle.result();
    let route = output(result, "routes/index-", ".js").text();
    assert!(route.contains("import path from \"node:path\";"));

    let metafile = result.metafile.as_ref().unwrap();
    let (_, output) = metafile.entry_output("routes/index").unwrap();
    assert!(output
      .imports
      .iter()
      .any(|import| import.external && import.path == "node:path"));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn rebuild_reuses_cached_work_until_disposed() {
    let fs = file_system();
    let engine = RoutepackEngine::new(fs.clone());

    let handle = engine.build(options()).await.unwrap();
    fs.write_file(
      Path::new("/app/app/routes/index.tsx"),
      String::from("export default function Index() { return null; }\n"),
    );

    let rebuilt = handle.rebuild().await.unwrap();
    let route = output(rebuilt.result(), "routes/index-", ".js").text();
    assert!(route.contains("return null;"));

    handle.dispose();
    let error = handle.rebuild().await.err().unwrap();
    assert_eq!(error.to_string(), "Cannot rebuild a disposed build");
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn rebuild_hits_the_content_cache() {
    let engine = RoutepackEngine::new(file_system());
    let options = options();
    let cache = Arc::new(EngineCache::default());

    run_build(&engine.file_system, &options, &cache).await.unwrap();
    let first = cache.stats();
    run_build(&engine.file_system, &options, &cache).await.unwrap();
    let second = cache.stats();

    assert_eq!(second.misses, first.misses);
    assert!(second.hits > first.hits);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn rebuild_requires_incremental() {
    let engine = RoutepackEngine::new(file_system());
    let handle = engine
      .build(BuildOptions {
        incremental: false,
        ..options()
      })
      .await
      .unwrap();

    assert!(handle.rebuild().await.is_err());
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn empty_stylesheets_produce_no_css_output() {
    let fs = file_system();
    fs.write_file(Path::new("/app/app/root.css"), String::from("\n"));
    fs.write_file(Path::new("/app/app/routes/index.tsx"), String::from("export default 1;\n"));
    fs.write_file(
      Path::new("/app/app/entry.client.tsx"),
      String::from("import \"./root.css\";\n"),
    );

    let engine = RoutepackEngine::new(fs);
    let handle = engine.build(options()).await.unwrap();
    let result = handle.result();

    assert!(result
      .output_files
      .iter()
      .all(|output| !output.has_extension(".css")));
    let (_, client) = result.metafile.as_ref().unwrap().entry_output("entry.client").unwrap();
    assert_eq!(client.css_bundle, None);
  }
}
