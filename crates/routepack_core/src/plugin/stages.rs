use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use super::PluginContext;
use crate::lexer::ImportKind;
use crate::types::Loader;

/// The namespace of modules that live on disk
pub const FILE_NAMESPACE: &str = "file";

/// Opaque data a stage passes to the stages that handle the same module later on
pub type PluginData = serde_json::Value;

/// How a module was reached
#[derive(Clone, Copy, Debug, Deserialize, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveKind {
  EntryPoint,
  ImportStatement,
  DynamicImport,
  RequireCall,
  ImportRule,
  UrlToken,
}

impl From<ImportKind> for ResolveKind {
  fn from(kind: ImportKind) -> Self {
    match kind {
      ImportKind::Static => ResolveKind::ImportStatement,
      ImportKind::Dynamic => ResolveKind::DynamicImport,
      ImportKind::Require => ResolveKind::RequireCall,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolveArgs {
  /// The specifier as written in the importing module, or the entry point locator
  pub path: String,
  /// Path of the importing module, if any
  pub importer: Option<String>,
  /// Namespace of the importing module
  pub namespace: String,
  /// Directory relative specifiers are resolved from
  pub resolve_dir: PathBuf,
  pub kind: ResolveKind,
  /// Data attached by the stage that loaded the importer
  pub plugin_data: Option<PluginData>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveResult {
  /// Absolute file path for the file namespace, any addressed string otherwise
  pub path: String,
  pub namespace: String,
  /// Leave the import in place instead of bundling the module
  pub external: bool,
  pub plugin_data: Option<PluginData>,
}

impl ResolveResult {
  pub fn file(path: PathBuf) -> Self {
    ResolveResult {
      path: path.to_string_lossy().into_owned(),
      namespace: String::from(FILE_NAMESPACE),
      ..ResolveResult::default()
    }
  }

  pub fn virtual_module(namespace: &str, path: impl Into<String>) -> Self {
    ResolveResult {
      path: path.into(),
      namespace: String::from(namespace),
      ..ResolveResult::default()
    }
  }

  pub fn external(path: impl Into<String>) -> Self {
    ResolveResult {
      path: path.into(),
      namespace: String::from(FILE_NAMESPACE),
      external: true,
      plugin_data: None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadArgs {
  pub path: String,
  pub namespace: String,
  pub plugin_data: Option<PluginData>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadResult {
  pub contents: String,
  pub loader: Loader,
  /// Directory the imports of this module are resolved from
  pub resolve_dir: Option<PathBuf>,
  pub plugin_data: Option<PluginData>,
}

#[async_trait]
pub trait OnResolve: Send + Sync {
  /// Returns `None` to let the next matching stage handle the specifier
  async fn on_resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>>;
}

#[async_trait]
pub trait OnLoad: Send + Sync {
  /// Returns `None` to let the next matching stage load the module
  async fn on_load(&self, ctx: &PluginContext, args: &LoadArgs)
    -> anyhow::Result<Option<LoadResult>>;
}

/// A resolve hook with the filter and namespace it applies to
#[derive(Clone)]
pub struct ResolveStage {
  pub plugin: String,
  pub filter: Regex,
  /// Importer namespace this stage is limited to, any namespace when `None`
  pub namespace: Option<String>,
  pub hook: Arc<dyn OnResolve>,
}

impl ResolveStage {
  pub fn matches(&self, args: &ResolveArgs) -> bool {
    self
      .namespace
      .as_ref()
      .is_none_or(|namespace| namespace == &args.namespace)
      && self.filter.is_match(&args.path)
  }
}

impl std::fmt::Debug for ResolveStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ResolveStage")
      .field("plugin", &self.plugin)
      .field("filter", &self.filter.as_str())
      .field("namespace", &self.namespace)
      .finish()
  }
}

/// A load hook with the filter and namespace it applies to
#[derive(Clone)]
pub struct LoadStage {
  pub plugin: String,
  pub filter: Regex,
  /// Module namespace this stage is limited to, the file namespace when `None`
  pub namespace: Option<String>,
  pub hook: Arc<dyn OnLoad>,
}

impl LoadStage {
  pub fn matches(&self, args: &LoadArgs) -> bool {
    let namespace = self.namespace.as_deref().unwrap_or(FILE_NAMESPACE);
    namespace == args.namespace && self.filter.is_match(&args.path)
  }
}

impl std::fmt::Debug for LoadStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadStage")
      .field("plugin", &self.plugin)
      .field("filter", &self.filter.as_str())
      .field("namespace", &self.namespace)
      .finish()
  }
}
