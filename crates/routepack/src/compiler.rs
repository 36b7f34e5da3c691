use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use routepack_core::diagnostic_error;
use routepack_core::engine::BuildHandle;
use routepack_core::engine::BuildOptions;
use routepack_core::engine::BuildResult;
use routepack_core::engine::Engine;
use routepack_core::engine::OutputFile;
use routepack_core::types::BuildTarget;
use routepack_filesystem::write_file;
use routepack_filesystem::FileSystemRef;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub use build_options::*;
pub use compile_queue::*;

use crate::channel::Channel;
use crate::config::RoutepackConfig;
use crate::dependencies::read_dependencies;
use crate::externals::get_externals;
use crate::manifest::Manifest;
use crate::manifest::ManifestBuilder;
use crate::plugins::ExtensionPlugins;

mod build_options;
mod compile_queue;

/// Global the manifest file assigns itself to
pub const MANIFEST_GLOBAL: &str = "window.__routepackManifest";

/// The incremental sessions of both targets, present once the first compile succeeded
#[derive(Default)]
pub struct BuildHandles {
  pub app: Option<Box<dyn BuildHandle>>,
  pub css: Option<Box<dyn BuildHandle>>,
}

/// Drives the application and stylesheet builds and publishes the manifest
///
/// The first [`BrowserCompiler::compile`] runs full builds, later ones rebuild the kept
/// sessions incrementally.
pub struct BrowserCompiler {
  app_options: BuildOptions,
  config: Arc<RoutepackConfig>,
  css_options: BuildOptions,
  engine: Arc<dyn Engine>,
  file_system: FileSystemRef,
  handles: BuildHandles,
  manifest_builder: Arc<dyn ManifestBuilder>,
}

impl std::fmt::Debug for BrowserCompiler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BrowserCompiler")
      .field("config", &self.config)
      .field("has_app_handle", &self.handles.app.is_some())
      .field("has_css_handle", &self.handles.css.is_some())
      .finish()
  }
}

impl BrowserCompiler {
  pub fn new(
    config: Arc<RoutepackConfig>,
    engine: Arc<dyn Engine>,
    manifest_builder: Arc<dyn ManifestBuilder>,
    file_system: FileSystemRef,
  ) -> anyhow::Result<Self> {
    Self::with_extensions(
      config,
      engine,
      manifest_builder,
      file_system,
      ExtensionPlugins::default(),
    )
  }

  /// Fails before any build when an application dependency shadows a builtin module
  pub fn with_extensions(
    config: Arc<RoutepackConfig>,
    engine: Arc<dyn Engine>,
    manifest_builder: Arc<dyn ManifestBuilder>,
    file_system: FileSystemRef,
    extensions: ExtensionPlugins,
  ) -> anyhow::Result<Self> {
    let dependencies = read_dependencies(file_system.as_ref(), &config.root_directory)?;
    let externals = get_externals(&dependencies)?;

    debug!(externals = externals.len(), "Computed external modules");

    let app_options =
      create_build_options(&config, BuildTarget::Application, &externals, &extensions);
    let css_options = create_build_options(
      &config,
      BuildTarget::StylesheetBundle,
      &externals,
      &extensions,
    );

    Ok(Self {
      app_options,
      config,
      css_options,
      engine,
      file_system,
      handles: BuildHandles::default(),
      manifest_builder,
    })
  }

  pub fn config(&self) -> &RoutepackConfig {
    &self.config
  }

  /// Builds both targets, then writes the stylesheet bundle and the manifest
  ///
  /// A failure in either build aborts the compile before anything is written. The session
  /// of a target that failed stays as it was.
  #[tracing::instrument(level = "info", name = "compile", skip_all)]
  pub async fn compile(&mut self, channel: &Channel<Manifest>) -> anyhow::Result<Manifest> {
    let start = Instant::now();

    let (app, css) = tokio::join!(
      build_target(
        self.engine.as_ref(),
        self.handles.app.as_deref(),
        &self.app_options,
        BuildTarget::Application,
      ),
      build_target(
        self.engine.as_ref(),
        self.handles.css.as_deref(),
        &self.css_options,
        BuildTarget::StylesheetBundle,
      ),
    );

    let (app, css) = match (app, css) {
      (Ok(app), Ok(css)) => (app, css),
      (Err(error), css) => {
        if let Ok(css) = css {
          self.handles.css = Some(css);
        }
        return Err(error);
      }
      (Ok(app), Err(error)) => {
        self.handles.app = Some(app);
        return Err(error);
      }
    };

    let stylesheets = select_stylesheet_outputs(&self.config, css.result());

    self.handles.app = Some(app);
    self.handles.css = Some(css);

    let metafile = self
      .handles
      .app
      .as_ref()
      .and_then(|app| app.result().metafile.as_ref())
      .ok_or_else(|| diagnostic_error!("The application build did not produce a metafile"))?;

    let mut manifest =
      self
        .manifest_builder
        .build(&self.config, metafile, stylesheets.bundle_path.clone())?;

    let file_name = format!("manifest-{}.js", manifest.version.to_uppercase());
    manifest.url = format!("{}{file_name}", self.config.public_path);

    let manifest_path = self.config.assets_build_directory.join(&file_name);
    let contents = format!("{MANIFEST_GLOBAL}={};", serde_json::to_string(&manifest)?);

    // The manifest names the stylesheet bundle, so it is written last. A failed manifest
    // write leaves hashed stylesheets no manifest points at, and nothing is published.
    for file in &stylesheets.files {
      write_file(self.file_system.as_ref(), &file.path, &file.contents)?;
      info!(path = %file.path.display(), "Wrote stylesheet output");
    }

    write_file(
      self.file_system.as_ref(),
      &manifest_path,
      contents.as_bytes(),
    )?;

    channel.write(manifest.clone());

    info!(
      duration = ?start.elapsed(),
      manifest = %manifest_path.display(),
      "Compiled browser build"
    );

    Ok(manifest)
  }

  /// Releases both incremental sessions; safe to call when none exist
  pub fn dispose(&mut self) {
    for handle in [self.handles.app.take(), self.handles.css.take()]
      .into_iter()
      .flatten()
    {
      handle.dispose();
    }
  }
}

#[tracing::instrument(level = "info", name = "build", skip_all, fields(build_target = %target))]
async fn build_target(
  engine: &dyn Engine,
  handle: Option<&dyn BuildHandle>,
  options: &BuildOptions,
  target: BuildTarget,
) -> anyhow::Result<Box<dyn BuildHandle>> {
  let start = Instant::now();

  let handle = match handle {
    Some(handle) => handle.rebuild().await?,
    None => engine.build(options.clone()).await?,
  };

  for warning in &handle.result().warnings {
    warn!("{}", warning.to_pretty_string());
  }

  info!(duration = ?start.elapsed(), "Built {target}");

  Ok(handle)
}

/// Stylesheet outputs to write, picked from the in-memory stylesheet build
#[derive(Debug, Default, PartialEq)]
struct StylesheetOutputs {
  files: Vec<OutputFile>,
  bundle_path: Option<PathBuf>,
}

fn select_stylesheet_outputs(config: &RoutepackConfig, result: &BuildResult) -> StylesheetOutputs {
  let mut files = Vec::new();

  for file in &result.output_files {
    if !file.path.starts_with(&config.assets_build_directory) {
      warn!(path = %file.path.display(), "Dropped stylesheet output outside of the assets directory");
      continue;
    }

    // The script stub of the bundle entry is the only output not worth keeping,
    // url() assets of scoped stylesheets are emitted by this build alone
    if file.has_extension(".js") || file.has_extension(".js.map") {
      debug!(path = %file.path.display(), "Discarded stylesheet build output");
    } else {
      files.push(file.clone());
    }
  }

  let from_metafile = result
    .metafile
    .as_ref()
    .and_then(|metafile| metafile.entry_output(CSS_BUNDLE_NAME))
    .and_then(|(_, output)| output.css_bundle.as_ref())
    .map(|key| config.root_directory.join(key))
    .filter(|path| files.iter().any(|file| &file.path == path));

  let bundle_path = from_metafile.or_else(|| {
    files
      .iter()
      .find(|file| file.has_extension(".css"))
      .map(|file| file.path.clone())
  });

  StylesheetOutputs { files, bundle_path }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::io;
  use std::path::Path;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;
  use std::time::Duration;

  use async_trait::async_trait;
  use indexmap::IndexMap;
  use indoc::indoc;
  use mockall::Sequence;
  use pretty_assertions::assert_eq;
  use regex::Regex;
  use routepack_core::engine::Metafile;
  use routepack_core::engine::MetafileOutput;
  use routepack_core::engine::MockBuildHandle;
  use routepack_core::engine::MockEngine;
  use routepack_core::types::BuildMode;
  use routepack_engine::RoutepackEngine;
  use routepack_filesystem::in_memory_file_system::InMemoryFileSystem;
  use routepack_filesystem::FileSystem;
  use routepack_filesystem::MockFileSystem;

  use super::*;
  use crate::config::load_config;
  use crate::config::RouteConfig;
  use crate::externals::CompilerError;
  use crate::manifest::DefaultManifestBuilder;
  use crate::manifest::ManifestEntry;
  use crate::manifest::MockManifestBuilder;

  fn project(route: &str) -> Arc<InMemoryFileSystem> {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(Path::new("/app"));

    let files = [
      (
        "/app/routepack.config.json",
        indoc! {r#"
          {
            "routes": [
              { "id": "root", "path": "", "file": "root.tsx" },
              { "id": "routes/index", "parentId": "root", "index": true, "file": "routes/index.tsx" }
            ]
          }
        "#},
      ),
      (
        "/app/package.json",
        r#"{ "dependencies": { "react": "^18.0.0" } }"#,
      ),
      (
        "/app/app/entry.client.tsx",
        indoc! {r#"
          import { runtime } from "./lib/runtime";
          console.log(runtime, process.env.NODE_ENV);
        "#},
      ),
      (
        "/app/app/root.tsx",
        indoc! {r#"
          export function ErrorBoundary() {}
          export default function Root() {}
        "#},
      ),
      ("/app/app/routes/index.tsx", route),
      (
        "/app/app/routes/index.module.css",
        ".title { color: red; }\n",
      ),
      ("/app/app/lib/runtime.ts", "export const runtime = 1;\n"),
    ];

    for (path, contents) in files {
      fs.write_file(Path::new(path), contents.to_string());
    }

    Arc::new(fs)
  }

  const STYLED_ROUTE: &str = indoc! {r#"
    import { runtime } from "../lib/runtime";
    import styles from "./index.module.css";
    export const loader = () => null;
    export default function Index() { return styles.title + runtime; }
  "#};

  const PLAIN_ROUTE: &str = indoc! {r#"
    import { runtime } from "../lib/runtime";
    export default function Index() { return runtime; }
  "#};

  fn compiler(fs: Arc<InMemoryFileSystem>, engine: Arc<dyn Engine>) -> BrowserCompiler {
    let config = load_config(fs.as_ref(), Path::new("/app"), None, BuildMode::Production).unwrap();

    BrowserCompiler::new(
      Arc::new(config),
      engine,
      Arc::new(DefaultManifestBuilder::new(fs.clone())),
      fs,
    )
    .unwrap()
  }

  fn files_under(fs: &InMemoryFileSystem, suffix: &str) -> Vec<PathBuf> {
    fs.files()
      .into_iter()
      .filter(|path| path.starts_with("/app/public/build"))
      .filter(|path| path.to_string_lossy().ends_with(suffix))
      .collect()
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn compiles_and_publishes_the_manifest() {
    let fs = project(STYLED_ROUTE);
    let mut compiler = compiler(fs.clone(), Arc::new(RoutepackEngine::new(fs.clone())));
    let channel = Channel::new();

    let manifest = compiler.compile(&channel).await.unwrap();

    assert!(Regex::new(r"^/build/entry\.client-[A-Z2-7]{8}\.js$")
      .unwrap()
      .is_match(&manifest.entry.module));
    assert!(manifest
      .entry
      .imports
      .iter()
      .any(|import| import.starts_with("/build/_shared/chunk-")));

    let route = &manifest.routes["routes/index"];
    assert!(Regex::new(r"^/build/routes/index-[A-Z2-7]{8}\.js$")
      .unwrap()
      .is_match(&route.module));
    assert_eq!(route.parent_id.as_deref(), Some("root"));
    assert!(route.has_loader);
    assert!(!route.has_action);
    assert!(manifest.routes["root"].has_error_boundary);

    assert_eq!(
      manifest.url,
      format!("/build/manifest-{}.js", manifest.version.to_uppercase())
    );
    assert_eq!(channel.read().await.unwrap(), manifest);

    let manifest_file = fs
      .read_to_string(&PathBuf::from(format!(
        "/app/public/build/manifest-{}.js",
        manifest.version.to_uppercase()
      )))
      .unwrap();
    assert_eq!(
      manifest_file,
      format!(
        "window.__routepackManifest={};",
        serde_json::to_string(&manifest).unwrap()
      )
    );

    let css_bundle_path = manifest.css_bundle_path.clone().unwrap();
    assert!(Regex::new(r"^/build/css-bundle-[A-Z2-7]{8}\.css$")
      .unwrap()
      .is_match(&css_bundle_path));

    let bundle_file = Path::new("/app/public").join(css_bundle_path.trim_start_matches('/'));
    assert_eq!(files_under(&fs, ".css"), vec![bundle_file.clone()]);

    let css = fs.read_to_string(&bundle_file).unwrap();
    let mapping = Regex::new(r#"export default \{"title":"([^"]+)"\}"#).unwrap();
    let class_names = files_under(&fs, ".js")
      .into_iter()
      .filter_map(|path| {
        let code = fs.read_to_string(&path).unwrap();
        mapping
          .captures(&code)
          .map(|captures| captures[1].to_string())
      })
      .collect::<Vec<_>>();

    assert_eq!(class_names.len(), 1);
    assert!(Regex::new(r"^[A-Za-z_][\w-]{4}$")
      .unwrap()
      .is_match(&class_names[0]));
    assert!(css.contains(&format!(".{}{{color:red}}", class_names[0])));
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn development_compiles_write_one_stylesheet_and_its_map() {
    let fs = project(STYLED_ROUTE);
    let config =
      load_config(fs.as_ref(), Path::new("/app"), None, BuildMode::Development).unwrap();
    let mut compiler = BrowserCompiler::new(
      Arc::new(config),
      Arc::new(RoutepackEngine::new(fs.clone())),
      Arc::new(DefaultManifestBuilder::new(fs.clone())),
      fs.clone(),
    )
    .unwrap();

    let manifest = compiler.compile(&Channel::new()).await.unwrap();

    let bundle_file = Path::new("/app/public").join(
      manifest
        .css_bundle_path
        .unwrap()
        .trim_start_matches('/'),
    );
    let mut source_map = bundle_file.clone().into_os_string();
    source_map.push(".map");

    assert_eq!(files_under(&fs, ".css"), vec![bundle_file]);
    assert_eq!(files_under(&fs, ".css.map"), vec![PathBuf::from(source_map)]);
  }

  #[derive(Debug)]
  struct CountingEngine {
    builds: AtomicUsize,
    inner: RoutepackEngine,
  }

  #[async_trait]
  impl Engine for CountingEngine {
    async fn build(&self, options: BuildOptions) -> anyhow::Result<Box<dyn BuildHandle>> {
      self.builds.fetch_add(1, Ordering::SeqCst);
      self.inner.build(options).await
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn later_compiles_rebuild_the_kept_sessions() {
    let fs = project(STYLED_ROUTE);
    let engine = Arc::new(CountingEngine {
      builds: AtomicUsize::new(0),
      inner: RoutepackEngine::new(fs.clone()),
    });
    let mut compiler = compiler(fs.clone(), engine.clone());
    let channel = Channel::new();

    let first = compiler.compile(&channel).await.unwrap();
    let second = compiler.compile(&channel).await.unwrap();

    assert_eq!(engine.builds.load(Ordering::SeqCst), 2);
    assert_eq!(first, second);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn failed_compiles_write_nothing() {
    let fs = project(STYLED_ROUTE);
    let mut compiler = compiler(fs.clone(), Arc::new(RoutepackEngine::new(fs.clone())));
    let channel = Channel::new();

    let manifest = compiler.compile(&channel).await.unwrap();
    let files = fs.files();
    let manifest_path = PathBuf::from(format!(
      "/app/public/build/manifest-{}.js",
      manifest.version.to_uppercase()
    ));
    let manifest_file = fs.read_to_string(&manifest_path).unwrap();

    fs.write_file(
      Path::new("/app/app/routes/index.tsx"),
      String::from("import { helper } from \"./missing\";\nexport default helper;\n"),
    );

    assert!(compiler.compile(&channel).await.is_err());
    assert_eq!(fs.files(), files);
    assert_eq!(fs.read_to_string(&manifest_path).unwrap(), manifest_file);
    assert_eq!(channel.read().await.unwrap(), manifest);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn skips_the_stylesheet_bundle_without_scoped_styles() {
    let fs = project(PLAIN_ROUTE);
    let mut compiler = compiler(fs.clone(), Arc::new(RoutepackEngine::new(fs.clone())));

    let manifest = compiler.compile(&Channel::new()).await.unwrap();

    assert_eq!(manifest.css_bundle_path, None);
    assert_eq!(files_under(&fs, ".css"), Vec::<PathBuf>::new());
    assert_eq!(files_under(&fs, ".js").len(), 5);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn shadowed_builtins_fail_before_building() {
    let fs = project(PLAIN_ROUTE);
    fs.write_file(
      Path::new("/app/package.json"),
      String::from(r#"{ "dependencies": { "path": "1.0.0", "events": "3.0.0" } }"#),
    );

    let config = load_config(fs.as_ref(), Path::new("/app"), None, BuildMode::Production).unwrap();
    let mut engine = MockEngine::new();
    engine.expect_build().never();

    let error = BrowserCompiler::new(
      Arc::new(config),
      Arc::new(engine),
      Arc::new(MockManifestBuilder::new()),
      fs,
    )
    .unwrap_err();

    assert_eq!(
      error.downcast_ref::<CompilerError>(),
      Some(&CompilerError::BuiltinShadowed {
        dependencies: vec![String::from("events"), String::from("path")],
      })
    );
  }

  fn mock_handle(result: BuildResult) -> MockBuildHandle {
    let mut handle = MockBuildHandle::new();
    handle.expect_result().return_const(result.clone());
    handle.expect_dispose().return_const(());
    handle
      .expect_rebuild()
      .returning(move || Ok(Box::new(mock_handle(result.clone()))));
    handle
  }

  fn output(path: &str, contents: &str) -> OutputFile {
    OutputFile {
      path: PathBuf::from(path),
      contents: contents.as_bytes().to_vec(),
    }
  }

  fn mock_config() -> Arc<RoutepackConfig> {
    Arc::new(RoutepackConfig {
      root_directory: PathBuf::from("/app"),
      app_directory: PathBuf::from("/app/app"),
      assets_build_directory: PathBuf::from("/app/public/build"),
      routes: vec![RouteConfig {
        id: String::from("routes/index"),
        file: PathBuf::from("routes/index.tsx"),
        ..RouteConfig::default()
      }],
      ..RoutepackConfig::default()
    })
  }

  fn stylesheet_result() -> BuildResult {
    BuildResult {
      metafile: Some(Metafile {
        inputs: BTreeMap::new(),
        outputs: BTreeMap::from([(
          String::from("public/build/css-bundle-AAAAAAAA.js"),
          MetafileOutput {
            entry_name: Some(String::from("css-bundle")),
            css_bundle: Some(String::from("public/build/css-bundle-AAAAAAAA.css")),
            ..MetafileOutput::default()
          },
        )]),
      }),
      output_files: vec![
        output("/app/public/build/css-bundle-AAAAAAAA.js", "export {};"),
        output("/app/public/build/css-bundle-AAAAAAAA.css", ".a{color:red}"),
        output("/app/public/build/css-bundle-AAAAAAAA.css.map", "{}"),
        output("/app/public/build/_assets/logo-BBBBBBBB.svg", "<svg/>"),
        output("/app/dist/stray.css", ".b{}"),
      ],
      warnings: Vec::new(),
    }
  }

  fn app_result() -> BuildResult {
    BuildResult {
      metafile: Some(Metafile::default()),
      ..BuildResult::default()
    }
  }

  fn mock_engine() -> MockEngine {
    let mut engine = MockEngine::new();
    engine.expect_build().times(2).returning(|options| {
      let result = if options.write {
        app_result()
      } else {
        stylesheet_result()
      };

      Ok(Box::new(mock_handle(result)))
    });
    engine
  }

  fn mock_manifest() -> Manifest {
    Manifest {
      version: String::from("c0ffee12"),
      entry: ManifestEntry {
        module: String::from("/build/entry.client-CCCCCCCC.js"),
        imports: Vec::new(),
      },
      routes: IndexMap::new(),
      css_bundle_path: Some(String::from("/build/css-bundle-AAAAAAAA.css")),
      ..Manifest::default()
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn writes_the_stylesheet_bundle_and_its_assets() {
    let fs = Arc::new(InMemoryFileSystem::default());
    let mut manifest_builder = MockManifestBuilder::new();
    manifest_builder
      .expect_build()
      .withf(|_, _, css_bundle_path| {
        css_bundle_path.as_deref() == Some(Path::new("/app/public/build/css-bundle-AAAAAAAA.css"))
      })
      .times(1)
      .returning(|_, _, _| Ok(mock_manifest()));

    let mut compiler = BrowserCompiler::new(
      mock_config(),
      Arc::new(mock_engine()),
      Arc::new(manifest_builder),
      fs.clone(),
    )
    .unwrap();
    let channel = Channel::new();

    let manifest = compiler.compile(&channel).await.unwrap();

    assert_eq!(manifest.url, "/build/manifest-C0FFEE12.js");
    assert_eq!(channel.read().await.unwrap(), manifest);
    assert_eq!(
      fs.files(),
      vec![
        PathBuf::from("/app/public/build/_assets/logo-BBBBBBBB.svg"),
        PathBuf::from("/app/public/build/css-bundle-AAAAAAAA.css"),
        PathBuf::from("/app/public/build/css-bundle-AAAAAAAA.css.map"),
        PathBuf::from("/app/public/build/manifest-C0FFEE12.js"),
      ]
    );
    assert_eq!(
      fs.read_to_string(Path::new("/app/public/build/css-bundle-AAAAAAAA.css"))
        .unwrap(),
      ".a{color:red}"
    );
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn a_failed_target_keeps_its_session() {
    let fs = Arc::new(InMemoryFileSystem::default());
    let mut manifest_builder = MockManifestBuilder::new();
    manifest_builder
      .expect_build()
      .returning(|_, _, _| Ok(mock_manifest()));

    let mut engine = MockEngine::new();
    engine.expect_build().times(2).returning(|options| {
      if !options.write {
        return Ok(Box::new(mock_handle(stylesheet_result())));
      }

      let mut app = MockBuildHandle::new();
      app.expect_result().return_const(app_result());
      app.expect_dispose().return_const(());
      app
        .expect_rebuild()
        .times(1)
        .returning(|| Err(anyhow::anyhow!("Syntax error in routes/index.tsx")));
      app
        .expect_rebuild()
        .times(1)
        .returning(|| Ok(Box::new(mock_handle(app_result()))));

      Ok(Box::new(app))
    });

    let mut compiler = BrowserCompiler::new(
      mock_config(),
      Arc::new(engine),
      Arc::new(manifest_builder),
      fs,
    )
    .unwrap();
    let channel = Channel::new();

    compiler.compile(&channel).await.unwrap();

    let error = compiler.compile(&channel).await.unwrap_err();
    assert_eq!(error.to_string(), "Syntax error in routes/index.tsx");

    compiler.compile(&channel).await.unwrap();
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn dispose_releases_the_sessions() {
    let fs = Arc::new(InMemoryFileSystem::default());
    let mut manifest_builder = MockManifestBuilder::new();
    manifest_builder
      .expect_build()
      .returning(|_, _, _| Ok(mock_manifest()));

    let mut compiler = BrowserCompiler::new(
      mock_config(),
      Arc::new(mock_engine()),
      Arc::new(manifest_builder),
      fs,
    )
    .unwrap();

    compiler.dispose();
    compiler.compile(&Channel::new()).await.unwrap();
    compiler.dispose();
    compiler.dispose();

    assert!(compiler.handles.app.is_none());
    assert!(compiler.handles.css.is_none());
  }

  #[test]
  fn selects_the_bundle_without_a_metafile() {
    let mut result = stylesheet_result();
    result.metafile = None;

    let selected = select_stylesheet_outputs(&mock_config(), &result);

    assert_eq!(
      selected.bundle_path,
      Some(PathBuf::from("/app/public/build/css-bundle-AAAAAAAA.css"))
    );
    assert_eq!(
      selected
        .files
        .iter()
        .map(|file| file.path.clone())
        .collect::<Vec<_>>(),
      vec![
        PathBuf::from("/app/public/build/css-bundle-AAAAAAAA.css"),
        PathBuf::from("/app/public/build/css-bundle-AAAAAAAA.css.map"),
        PathBuf::from("/app/public/build/_assets/logo-BBBBBBBB.svg"),
      ]
    );
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn writes_the_manifest_after_the_stylesheets() {
    let mut fs = MockFileSystem::new();
    let mut sequence = Sequence::new();

    fs.expect_is_file().return_const(false);
    fs.expect_create_directory().returning(|_| Ok(()));
    for path in [
      "/app/public/build/css-bundle-AAAAAAAA.css",
      "/app/public/build/css-bundle-AAAAAAAA.css.map",
      "/app/public/build/_assets/logo-BBBBBBBB.svg",
    ] {
      fs.expect_write()
        .withf(move |written, _| written == Path::new(path))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _| Ok(()));
    }
    fs.expect_write()
      .withf(|written, _| written == Path::new("/app/public/build/manifest-C0FFEE12.js"))
      .times(1)
      .in_sequence(&mut sequence)
      .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "disk full")));

    let mut manifest_builder = MockManifestBuilder::new();
    manifest_builder
      .expect_build()
      .returning(|_, _, _| Ok(mock_manifest()));

    let mut compiler = BrowserCompiler::new(
      mock_config(),
      Arc::new(mock_engine()),
      Arc::new(manifest_builder),
      Arc::new(fs),
    )
    .unwrap();
    let channel = Channel::new();

    let error = compiler.compile(&channel).await.unwrap_err();

    assert_eq!(
      error.to_string(),
      "Failed to write /app/public/build/manifest-C0FFEE12.js: disk full"
    );
    assert!(
      tokio::time::timeout(Duration::from_millis(10), channel.read())
        .await
        .is_err()
    );
  }
}
