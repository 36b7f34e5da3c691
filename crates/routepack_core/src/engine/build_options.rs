use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::plugin::PluginRef;
use crate::types::BuildMode;
use crate::types::Loader;

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
  /// Entry name to locator; locators are file paths or virtual ids a plugin resolves
  pub entry_points: IndexMap<String, String>,

  /// Project root; relative entry locators and metafile keys are relative to it
  pub abs_working_dir: PathBuf,

  /// Every output file path is inside this directory
  pub outdir: PathBuf,

  /// URL prefix under which `outdir` is served
  pub public_path: String,

  /// Templates for output names, supporting `[dir]`, `[name]` and `[hash]`
  pub entry_names: String,
  pub chunk_names: String,
  pub asset_names: String,

  /// Moves modules shared by several entries into a shared chunk
  pub splitting: bool,
  pub minify: bool,
  pub sourcemap: bool,
  pub keep_names: bool,

  /// Identifier replacements, for example `process.env.NODE_ENV`
  pub define: BTreeMap<String, String>,

  /// Bare specifiers left as imports instead of being bundled
  pub external: BTreeSet<String>,

  /// Specifier prefix replacements applied before resolution
  pub alias: BTreeMap<String, String>,

  /// Extension (without dot) to loader overrides
  pub loader: BTreeMap<String, Loader>,

  pub plugins: Vec<PluginRef>,

  /// Write outputs to disk; when false they are only returned in the result
  pub write: bool,
  pub metafile: bool,
  pub incremental: bool,

  pub mode: BuildMode,
}
