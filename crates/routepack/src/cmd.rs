use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use routepack::compiler::BrowserCompiler;
use routepack::config::load_config;
use routepack::manifest::DefaultManifestBuilder;
use routepack_core::diagnostic::Diagnostic;
use routepack_core::diagnostic::Diagnostics;
use routepack_core::types::BuildMode;
use routepack_engine::RoutepackEngine;
use routepack_filesystem::os_file_system::OsFileSystem;
use routepack_filesystem::FileSystemRef;

pub mod build;
pub mod watch;

/// Options shared by every command that compiles a project
#[derive(Debug, Args)]
pub struct ProjectArgs {
  /// Project root containing routepack.config.json
  #[arg(default_value = ".")]
  pub root: PathBuf,
  /// Config file to read instead of routepack.config.json, relative to the root
  #[arg(long, env = "ROUTEPACK_CONFIG")]
  pub config: Option<PathBuf>,
  /// Build in development mode: readable names, source maps, no minification
  #[arg(long)]
  pub dev: bool,
}

impl ProjectArgs {
  pub fn mode(&self) -> BuildMode {
    if self.dev {
      BuildMode::Development
    } else {
      BuildMode::Production
    }
  }

  pub fn create_compiler(&self) -> anyhow::Result<BrowserCompiler> {
    let file_system: FileSystemRef = Arc::new(OsFileSystem);
    let root = file_system.canonicalize(&self.root)?;
    let config = load_config(
      file_system.as_ref(),
      &root,
      self.config.as_deref(),
      self.mode(),
    )?;

    tracing::debug!(root = %root.display(), mode = %config.mode, "Loaded config");

    BrowserCompiler::new(
      Arc::new(config),
      Arc::new(RoutepackEngine::new(file_system.clone())),
      Arc::new(DefaultManifestBuilder::new(file_system.clone())),
      file_system,
    )
  }
}

/// Logs an error, expanding diagnostics into their code locations
pub fn report(error: &anyhow::Error) {
  if let Some(diagnostics) = error.downcast_ref::<Diagnostics>() {
    for diagnostic in diagnostics.as_ref() {
      tracing::error!("{}", diagnostic.to_pretty_string());
    }
  } else if let Some(diagnostic) = error.downcast_ref::<Diagnostic>() {
    tracing::error!("{}", diagnostic.to_pretty_string());
  } else {
    tracing::error!("{error:#}");
  }
}
