use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lightningcss::css_modules::Config;
use lightningcss::css_modules::CssModuleExport;
use lightningcss::css_modules::CssModuleReference;
use lightningcss::css_modules::Pattern;
use lightningcss::error::ErrorLocation;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::ParserOptions;
use lightningcss::stylesheet::StyleSheet;
use parcel_sourcemap::SourceMap;
use regex::Captures;
use regex::Regex;
use routepack_core::diagnostic::CodeFrame;
use routepack_core::diagnostic::CodeHighlight;
use routepack_core::diagnostic::DiagnosticBuilder;
use routepack_core::diagnostic_error;
use routepack_core::plugin::PluginContext;
use tracing::debug;

use crate::naming::development_pattern;
use crate::naming::production_names;
use crate::PLUGIN_NAME;

/// Wraps each local name in production so it can be swapped for its hash after printing
const PRODUCTION_PATTERN: &str = "\u{E000}[local]\u{E001}";

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new("\u{E000}([^\u{E001}]*)\u{E001}").unwrap());

/// A compiled scoped stylesheet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopedStylesheet {
  /// The rewritten stylesheet, with an inline source map in development
  pub css: String,

  /// Authored name to generated name(s), space separated when the class composes others
  pub mapping: BTreeMap<String, String>,

  /// Specifiers of other scoped stylesheets this one composes from, in first-use order
  pub dependencies: Vec<String>,
}

/// Rewrites the local names of a scoped stylesheet to globally unique names
///
/// Supports `:global`, `:local`, `composes` (local, global and from other files) and
/// `@keyframes` with the animations that reference them.
pub struct ScopedStyleTransform<'a> {
  ctx: &'a PluginContext,
  compiled: HashMap<PathBuf, BTreeMap<String, String>>,
  in_progress: Vec<PathBuf>,
}

impl<'a> ScopedStyleTransform<'a> {
  pub fn new(ctx: &'a PluginContext) -> Self {
    Self {
      ctx,
      compiled: HashMap::new(),
      in_progress: Vec::new(),
    }
  }

  pub fn transform(&mut self, path: &Path, code: &str) -> anyhow::Result<ScopedStylesheet> {
    self.in_progress.push(path.to_path_buf());
    let result = self.compile(path, code);
    self.in_progress.pop();

    if let Ok(stylesheet) = &result {
      self
        .compiled
        .insert(path.to_path_buf(), stylesheet.mapping.clone());
    }

    result
  }

  fn compile(&mut self, path: &Path, code: &str) -> anyhow::Result<ScopedStylesheet> {
    let relative_path = self.ctx.relative_path(path);
    let project_root = self.ctx.project_root.to_string_lossy().into_owned();
    let production = self.ctx.mode.is_production();

    let file_name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();

    let pattern_source = if production {
      String::from(PRODUCTION_PATTERN)
    } else {
      development_pattern(&file_name, &relative_path, code)
    };

    let pattern = Pattern::parse(&pattern_source)
      .map_err(|error| anyhow::anyhow!("Invalid name pattern {pattern_source}: {error}"))?;

    let stylesheet = StyleSheet::parse(
      code,
      ParserOptions {
        filename: path.to_string_lossy().into_owned(),
        css_modules: Some(Config {
          pattern,
          dashed_idents: false,
          animation: true,
          grid: false,
          custom_idents: false,
          container: false,
          pure: false,
        }),
        ..ParserOptions::default()
      },
    )
    .map_err(|error| self.syntax_error(path, code, error.kind.to_string(), error.loc))?;

    let mut source_map = if production {
      None
    } else {
      let mut source_map = SourceMap::new(&project_root);
      source_map.add_source(&relative_path);
      source_map.set_source_content(0, code)?;
      Some(source_map)
    };

    let printed = stylesheet
      .to_css(PrinterOptions {
        minify: false,
        source_map: source_map.as_mut(),
        project_root: Some(project_root.as_str()),
        ..PrinterOptions::default()
      })
      .map_err(|error| self.syntax_error(path, code, error.kind.to_string(), error.loc))?;

    let exports: BTreeMap<String, CssModuleExport> =
      printed.exports.unwrap_or_default().into_iter().collect();

    let lookup = if production {
      let locals = exports.keys().cloned().collect::<BTreeSet<_>>();
      let names = production_names(&relative_path, code, &locals);

      let mut lookup = HashMap::with_capacity(names.len() * 2);
      for (local, name) in names {
        let mut serialized = String::new();
        cssparser::serialize_name(&local, &mut serialized)?;
        lookup.insert(serialized, name.clone());
        lookup.insert(local, name);
      }

      Some(lookup)
    } else {
      None
    };

    let rename = |text: &str| -> String {
      match &lookup {
        Some(lookup) => PLACEHOLDER
          .replace_all(text, |captures: &Captures<'_>| {
            lookup
              .get(&captures[1])
              .cloned()
              .unwrap_or_else(|| captures[1].to_string())
          })
          .into_owned(),
        None => text.to_string(),
      }
    };

    let mut mapping = BTreeMap::new();
    let mut dependencies: Vec<String> = Vec::new();

    for (exported, export) in &exports {
      let mut names = vec![rename(&export.name)];

      for reference in &export.composes {
        match reference {
          CssModuleReference::Local { name } => names.push(rename(name)),
          CssModuleReference::Global { name } => names.push(name.clone()),
          CssModuleReference::Dependency { name, specifier } => {
            let composed = self.compose_from(path, specifier, name)?;
            names.extend(composed.split(' ').map(String::from));

            if !dependencies.contains(specifier) {
              dependencies.push(specifier.clone());
            }
          }
        }
      }

      let mut unique: Vec<String> = Vec::with_capacity(names.len());
      for name in names {
        if !unique.contains(&name) {
          unique.push(name);
        }
      }

      mapping.insert(exported.clone(), unique.join(" "));
    }

    let mut css = rename(&printed.code);

    if let Some(source_map) = source_map.as_mut() {
      let json = source_map.to_json(None)?;
      css.push_str(&format!(
        "\n/*# sourceMappingURL=data:application/json;base64,{} */",
        STANDARD.encode(json)
      ));
    }

    debug!(path = %relative_path, names = mapping.len(), "Compiled scoped stylesheet");

    Ok(ScopedStylesheet {
      css,
      mapping,
      dependencies,
    })
  }

  /// Generated names of `name` in the stylesheet `specifier` points at
  fn compose_from(&mut self, importer: &Path, specifier: &str, name: &str) -> anyhow::Result<String> {
    let resolve_dir = importer.parent().unwrap_or(importer);

    let dependency = self.ctx.resolve(specifier, resolve_dir).map_err(|error| {
      diagnostic_error!(DiagnosticBuilder::default()
        .message(format!(
          "Could not resolve \"{specifier}\" composed from {}",
          importer.display()
        ))
        .origin(Some(String::from(PLUGIN_NAME)))
        .code_frames(vec![CodeFrame::from(importer.to_path_buf())])
        .hints(vec![error.to_string()]))
    })?;

    if self.in_progress.contains(&dependency) {
      return Err(diagnostic_error!(DiagnosticBuilder::default()
        .message(format!(
          "Circular composition: {} composes from {}, which is still being compiled",
          importer.display(),
          dependency.display()
        ))
        .origin(Some(String::from(PLUGIN_NAME)))
        .code_frames(vec![CodeFrame::from(importer.to_path_buf())])));
    }

    if !self.compiled.contains_key(&dependency) {
      let code = self.ctx.file_system.read_to_string(&dependency).map_err(|error| {
        anyhow::anyhow!("Failed to read {}: {error}", dependency.display())
      })?;

      self.transform(&dependency, &code)?;
    }

    self
      .compiled
      .get(&dependency)
      .and_then(|mapping| mapping.get(name))
      .cloned()
      .ok_or_else(|| {
        diagnostic_error!(DiagnosticBuilder::default()
          .message(format!(
            "\"{name}\" is not defined in \"{specifier}\" composed from {}",
            importer.display()
          ))
          .origin(Some(String::from(PLUGIN_NAME)))
          .code_frames(vec![CodeFrame::from(importer.to_path_buf())]))
      })
  }

  fn syntax_error(
    &self,
    path: &Path,
    code: &str,
    message: String,
    loc: Option<ErrorLocation>,
  ) -> anyhow::Error {
    let code_highlights = loc
      .map(|loc| {
        vec![CodeHighlight {
          message: Some(message.clone()),
          ..CodeHighlight::from([loc.line as usize + 1, loc.column as usize])
        }]
      })
      .unwrap_or_default();

    diagnostic_error!(DiagnosticBuilder::default()
      .message(format!("Failed to compile {}: {message}", path.display()))
      .origin(Some(String::from(PLUGIN_NAME)))
      .code_frames(vec![CodeFrame {
        code_highlights,
        ..CodeFrame::new(path.to_path_buf(), code.to_string())
      }]))
  }
}
