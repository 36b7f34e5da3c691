use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::LoadArgs;
use super::LoadResult;
use super::LoadStage;
use super::OnLoad;
use super::OnResolve;
use super::PluginContext;
use super::PluginRef;
use super::ResolveArgs;
use super::ResolveResult;
use super::ResolveStage;

/// The resolve and load stages of every plugin in a build, in plugin order
#[derive(Debug, Default)]
pub struct PluginRegistry {
  current_plugin: String,
  load_stages: Vec<LoadStage>,
  resolve_stages: Vec<ResolveStage>,
}

impl PluginRegistry {
  /// Runs `setup` for every plugin, in order
  pub fn new(plugins: &[PluginRef]) -> anyhow::Result<Self> {
    let mut registry = PluginRegistry::default();

    for plugin in plugins {
      registry.current_plugin = plugin.name().to_string();
      plugin.setup(&mut registry)?;
    }

    registry.current_plugin.clear();

    Ok(registry)
  }

  pub fn on_resolve(
    &mut self,
    filter: &str,
    namespace: Option<&str>,
    hook: Arc<dyn OnResolve>,
  ) -> anyhow::Result<()> {
    self.resolve_stages.push(ResolveStage {
      plugin: self.current_plugin.clone(),
      filter: self.compile_filter(filter)?,
      namespace: namespace.map(String::from),
      hook,
    });

    Ok(())
  }

  pub fn on_load(
    &mut self,
    filter: &str,
    namespace: Option<&str>,
    hook: Arc<dyn OnLoad>,
  ) -> anyhow::Result<()> {
    self.load_stages.push(LoadStage {
      plugin: self.current_plugin.clone(),
      filter: self.compile_filter(filter)?,
      namespace: namespace.map(String::from),
      hook,
    });

    Ok(())
  }

  pub fn resolve_stages(&self) -> &[ResolveStage] {
    &self.resolve_stages
  }

  pub fn load_stages(&self) -> &[LoadStage] {
    &self.load_stages
  }

  /// Returns the result of the first matching stage that handles the specifier
  pub async fn resolve(
    &self,
    ctx: &PluginContext,
    args: &ResolveArgs,
  ) -> anyhow::Result<Option<ResolveResult>> {
    for stage in self.resolve_stages.iter().filter(|stage| stage.matches(args)) {
      if let Some(result) = stage.hook.on_resolve(ctx, args).await? {
        debug!(
          plugin = %stage.plugin,
          specifier = %args.path,
          namespace = %result.namespace,
          "Resolved by plugin"
        );
        return Ok(Some(result));
      }
    }

    Ok(None)
  }

  /// Returns the result of the first matching stage that loads the module
  pub async fn load(
    &self,
    ctx: &PluginContext,
    args: &LoadArgs,
  ) -> anyhow::Result<Option<LoadResult>> {
    for stage in self.load_stages.iter().filter(|stage| stage.matches(args)) {
      if let Some(result) = stage.hook.on_load(ctx, args).await? {
        debug!(plugin = %stage.plugin, path = %args.path, "Loaded by plugin");
        return Ok(Some(result));
      }
    }

    Ok(None)
  }

  fn compile_filter(&self, filter: &str) -> anyhow::Result<Regex> {
    Regex::new(filter).map_err(|error| {
      anyhow::anyhow!(
        "Plugin {} registered an invalid filter {filter}: {error}",
        self.current_plugin
      )
    })
  }
}
