use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use data_encoding::BASE32_NOPAD;
use parcel_sourcemap::SourceMap;
use regex::Captures;
use regex::Regex;
use routepack_core::diagnostic::Diagnostic;
use routepack_core::engine::BuildOptions;
use routepack_core::engine::Metafile;
use routepack_core::engine::MetafileImport;
use routepack_core::engine::MetafileInput;
use routepack_core::engine::MetafileOutput;
use routepack_core::engine::MetafileOutputInput;
use routepack_core::engine::OutputFile;
use routepack_core::lexer;
use routepack_core::plugin::ResolveKind;
use routepack_core::types::Loader;
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::EngineCache;
use crate::chunks::Chunk;
use crate::css;
use crate::module_graph::to_slash;
use crate::module_graph::ImportTarget;
use crate::module_graph::Module;
use crate::module_graph::ModuleGraph;

static INLINE_SOURCE_MAP: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"/\*# sourceMappingURL=(data:application/json[^\s*]*)\s*\*/\n?").unwrap()
});

const HASH_LENGTH: usize = 8;

pub struct RenderedOutputs {
  pub output_files: Vec<OutputFile>,
  pub metafile: Metafile,
  pub warnings: Vec<Diagnostic>,
}

/// Turns chunks into output files and describes them in a metafile
pub struct Renderer<'a> {
  cache: &'a EngineCache,
  defines: Vec<(Regex, String)>,
  graph: &'a ModuleGraph,
  metafile: Metafile,
  module_urls: HashMap<usize, String>,
  options: &'a BuildOptions,
  outbase: PathBuf,
  outdir: PathBuf,
  output_files: Vec<OutputFile>,
  warnings: Vec<Diagnostic>,
}

struct ChunkName {
  template: String,
  dir: String,
  name: String,
}

impl<'a> Renderer<'a> {
  pub fn new(
    options: &'a BuildOptions,
    graph: &'a ModuleGraph,
    cache: &'a EngineCache,
  ) -> anyhow::Result<Self> {
    let defines = options
      .define
      .iter()
      .map(|(key, value)| {
        let pattern = format!(r"(^|[^\w$.]){}\b", regex::escape(key));
        Regex::new(&pattern)
          .map(|regex| (regex, value.clone()))
          .map_err(|error| anyhow::anyhow!("Invalid define {key}: {error}"))
      })
      .collect::<anyhow::Result<Vec<_>>>()?;

    let outdir = if options.outdir.is_absolute() {
      options.outdir.clone()
    } else {
      options.abs_working_dir.join(&options.outdir)
    };

    let outbase = common_directory(
      graph
        .entries
        .iter()
        .filter_map(|(_, module)| graph.modules[*module].file_path())
        .filter_map(Path::parent),
    )
    .unwrap_or_else(|| options.abs_working_dir.clone());

    Ok(Self {
      cache,
      defines,
      graph,
      metafile: Metafile::default(),
      module_urls: HashMap::new(),
      options,
      outbase,
      outdir,
      output_files: Vec::new(),
      warnings: Vec::new(),
    })
  }

  pub fn render(mut self, chunks: &[Chunk]) -> anyhow::Result<RenderedOutputs> {
    let graph = self.graph;
    self.describe_inputs();
    self.emit_assets();

    let mut chunk_paths: HashMap<usize, PathBuf> = HashMap::new();

    for (index, chunk) in chunks.iter().enumerate() {
      if chunk.entry.is_none() {
        let name = ChunkName {
          template: self.options.chunk_names.clone(),
          dir: String::new(),
          name: String::from("chunk"),
        };

        let path = self.render_script(chunk, &name, &[], None)?;
        chunk_paths.insert(index, path);
      }
    }

    for chunk in chunks {
      let Some(entry) = chunk.entry else {
        continue;
      };

      let (entry_name, module) = &graph.entries[entry];
      let name = self.entry_chunk_name(entry_name, &graph.modules[*module]);

      let css_bundle = self.render_stylesheet(chunk, &name)?;
      let shared = chunk
        .shared
        .iter()
        .filter_map(|index| chunk_paths.get(index).cloned())
        .collect::<Vec<_>>();

      self.render_script(chunk, &name, &shared, css_bundle)?;
    }

    Ok(RenderedOutputs {
      output_files: self.output_files,
      metafile: self.metafile,
      warnings: self.warnings,
    })
  }

  fn describe_inputs(&mut self) {
    let graph = self.graph;
    for module in &graph.modules {
      let imports = module
        .imports
        .iter()
        .map(|import| match &import.target {
          ImportTarget::Module(target) => MetafileImport {
            path: graph.modules[*target].key.clone(),
            kind: import.kind,
            external: false,
          },
          ImportTarget::External(path) => MetafileImport {
            path: path.clone(),
            kind: import.kind,
            external: true,
          },
        })
        .collect();

      self.metafile.inputs.insert(
        module.key.clone(),
        MetafileInput {
          bytes: module.source.len(),
          imports,
        },
      );
    }
  }

  /// Copies `File` modules to the assets directory and inlines `DataUrl` modules
  fn emit_assets(&mut self) {
    let graph = self.graph;
    for (index, module) in graph.modules.iter().enumerate() {
      match module.loader {
        Loader::File => {
          let path = Path::new(&module.path);
          let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("asset"));
          let extension = path
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();

          let relative = expand_template(
            &self.options.asset_names,
            &self.module_dir(module),
            &stem,
            &content_hash(&module.source),
          );

          let output_path = self.outdir.join(format!("{relative}{extension}"));
          self
            .module_urls
            .insert(index, self.public_url(&output_path));

          self.push_output(
            output_path,
            module.source.clone(),
            MetafileOutput {
              inputs: BTreeMap::from([(
                module.key.clone(),
                MetafileOutputInput {
                  bytes_in_output: module.source.len(),
                },
              )]),
              ..MetafileOutput::default()
            },
          );
        }
        Loader::DataUrl => {
          let url = format!(
            "data:{};base64,{}",
            mime_type(&module.path),
            STANDARD.encode(&module.source)
          );
          self.module_urls.insert(index, url);
        }
        _ => {}
      }
    }
  }

  fn entry_chunk_name(&self, entry_name: &str, module: &Module) -> ChunkName {
    let name = module
      .file_path()
      .and_then(Path::file_stem)
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_else(|| entry_name.to_string());

    ChunkName {
      template: self.options.entry_names.clone(),
      dir: self.module_dir(module),
      name,
    }
  }

  /// Directory of a file backed module relative to the common entry directory
  fn module_dir(&self, module: &Module) -> String {
    module
      .file_path()
      .and_then(Path::parent)
      .and_then(|dir| dir.strip_prefix(&self.outbase).ok())
      .map(to_slash)
      .unwrap_or_default()
  }

  fn render_script(
    &mut self,
    chunk: &Chunk,
    name: &ChunkName,
    shared: &[PathBuf],
    css_bundle: Option<String>,
  ) -> anyhow::Result<PathBuf> {
    let graph = self.graph;
    let mut code = String::new();
    let mut source_map = self
      .options
      .sourcemap
      .then(|| SourceMap::new(&self.options.abs_working_dir.to_string_lossy()));
    let mut inputs = BTreeMap::new();
    let mut imports = Vec::new();

    let output_dir = self
      .outdir
      .join(expand_template(&name.template, &name.dir, &name.name, "0"))
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| self.outdir.clone());

    for path in shared {
      let relative = pathdiff::diff_paths(path, &output_dir).unwrap_or_else(|| path.clone());
      let relative = to_slash(&relative);
      let specifier = if relative.starts_with('.') {
        relative
      } else {
        format!("./{relative}")
      };

      code.push_str(&format!("import \"{specifier}\";\n"));
      imports.push(MetafileImport {
        path: self.output_key(path),
        kind: ResolveKind::ImportStatement,
        external: false,
      });
    }

    for index in &chunk.modules {
      let module = &graph.modules[*index];
      let Some(body) = self.render_module(*index, module) else {
        continue;
      };

      for import in &module.imports {
        if let ImportTarget::External(path) = &import.target {
          let import = MetafileImport {
            path: path.clone(),
            kind: import.kind,
            external: true,
          };

          if !imports.contains(&import) {
            imports.push(import);
          }
        }
      }

      if !self.options.minify {
        code.push_str(&format!("// {}\n", module.key));
      }

      if let Some(source_map) = source_map.as_mut() {
        if module.loader.is_script() {
          source_map.add_empty_map(&module.key, &module.text(), line_count(&code))?;
        }
      }

      inputs.insert(
        module.key.clone(),
        MetafileOutputInput {
          bytes_in_output: body.len(),
        },
      );

      code.push_str(&body);
      if !body.ends_with('\n') {
        code.push('\n');
      }
    }

    let relative = expand_template(
      &name.template,
      &name.dir,
      &name.name,
      &content_hash(code.as_bytes()),
    );
    let output_path = self.outdir.join(format!("{relative}.js"));

    if let Some(source_map) = source_map.as_mut() {
      self.push_source_map(&output_path, &mut code, source_map, "//# sourceMappingURL={}\n")?;
    }

    let (exports, entry_point, entry_name) = match chunk.entry {
      Some(entry) => {
        let (entry_name, module) = &graph.entries[entry];
        let module = &graph.modules[*module];
        let exports = if module.loader.is_script() {
          lexer::exports(&module.text())
        } else {
          Vec::new()
        };

        (exports, Some(module.key.clone()), Some(entry_name.clone()))
      }
      None => (Vec::new(), None, None),
    };

    self.push_output(
      output_path.clone(),
      code.into_bytes(),
      MetafileOutput {
        inputs,
        imports,
        exports,
        entry_point,
        entry_name,
        css_bundle,
        ..MetafileOutput::default()
      },
    );

    Ok(output_path)
  }

  fn render_module(&self, index: usize, module: &Module) -> Option<String> {
    let ident = format!("__{}", identifier(&module.key));

    match module.loader {
      Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx => Some(self.render_script_module(module)),
      Loader::Json => Some(format!("const {ident} = {};", module.text().trim())),
      Loader::Text => Some(format!(
        "const {ident} = {};",
        serde_json::Value::String(module.text())
      )),
      Loader::File | Loader::DataUrl => self.module_urls.get(&index).map(|url| {
        format!(
          "const {ident} = {};",
          serde_json::Value::String(url.clone())
        )
      }),
      Loader::Css | Loader::Empty => None,
    }
  }

  /// Comments out static imports of bundled modules and applies defines
  ///
  /// Line breaks inside replaced statements are kept so each module maps onto the output
  /// line for line.
  fn render_script_module(&self, module: &Module) -> String {
    let mut code = module.text();

    for import in module.imports.iter().rev() {
      let bundled = matches!(import.target, ImportTarget::Module(_));
      if !bundled || import.kind != ResolveKind::ImportStatement {
        continue;
      }

      let Some(statement) = code.get(import.span.clone()) else {
        continue;
      };

      let line_breaks = "\n".repeat(statement.matches('\n').count());
      let replacement = format!(
        "/* bundled {} */{line_breaks}",
        serde_json::Value::String(import.specifier.replace("*/", "* /"))
      );
      code.replace_range(import.span.clone(), &replacement);
    }

    for (regex, value) in &self.defines {
      code = regex
        .replace_all(&code, |captures: &Captures| format!("{}{}", &captures[1], value))
        .into_owned();
    }

    code
  }

  /// Concatenates the stylesheets an entry reaches, returning the output key
  fn render_stylesheet(
    &mut self,
    chunk: &Chunk,
    name: &ChunkName,
  ) -> anyhow::Result<Option<String>> {
    let graph = self.graph;
    let mut code = String::new();
    let mut source_map = (self.options.sourcemap && !self.options.minify)
      .then(|| SourceMap::new(&self.options.abs_working_dir.to_string_lossy()));
    let mut inputs = BTreeMap::new();

    for index in &chunk.stylesheets {
      let module = &graph.modules[*index];
      let original = module.text();
      let mut text = original.clone();

      for import in module.imports.iter().rev() {
        let replacement = match (&import.kind, &import.target) {
          (ResolveKind::ImportRule, ImportTarget::Module(_)) => String::new(),
          (ResolveKind::UrlToken, ImportTarget::Module(target)) => {
            match self.module_urls.get(target) {
              Some(url) => format!("url({})", serde_json::Value::String(url.clone())),
              None => {
                self.warnings.push(Diagnostic {
                  message: format!(
                    "{} references {} with url(), which is not an asset",
                    module.key, import.specifier
                  ),
                  origin: Some(String::from("routepack_engine")),
                  ..Diagnostic::default()
                });
                continue;
              }
            }
          }
          _ => continue,
        };

        if text.get(import.span.clone()).is_some() {
          text.replace_range(import.span.clone(), &replacement);
        }
      }

      let inline_map = INLINE_SOURCE_MAP
        .captures(&text)
        .and_then(|captures| captures.get(1))
        .map(|url| url.as_str().to_string());
      let text = INLINE_SOURCE_MAP.replace_all(&text, "").into_owned();

      if text.trim().is_empty() {
        continue;
      }

      if let Some(source_map) = source_map.as_mut() {
        let line_offset = line_count(&code);
        match inline_map {
          Some(url) => {
            let mut inline = SourceMap::from_data_url(
              &self.options.abs_working_dir.to_string_lossy(),
              &url,
            )?;
            source_map.add_sourcemap(&mut inline, line_offset)?;
          }
          None => source_map.add_empty_map(&module.key, &original, line_offset)?,
        }
      }

      inputs.insert(
        module.key.clone(),
        MetafileOutputInput {
          bytes_in_output: text.len(),
        },
      );

      code.push_str(&text);
      if !text.ends_with('\n') {
        code.push('\n');
      }
    }

    if code.trim().is_empty() {
      return Ok(None);
    }

    if self.options.minify {
      let filename = format!("{}.css", name.name);
      code = self
        .cache
        .minified_css(&code, || css::minify(&code, &filename))?;
    }

    let relative = expand_template(
      &name.template,
      &name.dir,
      &name.name,
      &content_hash(code.as_bytes()),
    );
    let output_path = self.outdir.join(format!("{relative}.css"));

    if let Some(source_map) = source_map.as_mut() {
      self.push_source_map(&output_path, &mut code, source_map, "/*# sourceMappingURL={} */\n")?;
    }

    let key = self.output_key(&output_path);
    self.push_output(
      output_path,
      code.into_bytes(),
      MetafileOutput {
        inputs,
        ..MetafileOutput::default()
      },
    );

    Ok(Some(key))
  }

  /// Emits `<output>.map` and links it from the end of `code`
  fn push_source_map(
    &mut self,
    output_path: &Path,
    code: &mut String,
    source_map: &mut SourceMap,
    comment: &str,
  ) -> anyhow::Result<()> {
    let file_name = output_path
      .file_name()
      .map(|name| format!("{}.map", name.to_string_lossy()))
      .unwrap_or_default();

    code.push_str(&comment.replace("{}", &file_name));

    let json = source_map.to_json(None)?;
    self.push_output(
      output_path.with_file_name(&file_name),
      json.into_bytes(),
      MetafileOutput::default(),
    );

    Ok(())
  }

  fn push_output(&mut self, path: PathBuf, contents: Vec<u8>, mut output: MetafileOutput) {
    output.bytes = contents.len();
    self.metafile.outputs.insert(self.output_key(&path), output);
    self.output_files.push(OutputFile { path, contents });
  }

  fn output_key(&self, path: &Path) -> String {
    pathdiff::diff_paths(path, &self.options.abs_working_dir)
      .map(|relative| to_slash(&relative))
      .unwrap_or_else(|| to_slash(path))
  }

  fn public_url(&self, path: &Path) -> String {
    let relative = path
      .strip_prefix(&self.outdir)
      .map(to_slash)
      .unwrap_or_else(|_| to_slash(path));

    format!(
      "{}/{}",
      self.options.public_path.trim_end_matches('/'),
      relative
    )
  }
}

/// Fills in `[dir]`, `[name]` and `[hash]`, dropping empty path segments
pub fn expand_template(template: &str, dir: &str, name: &str, hash: &str) -> String {
  template
    .replace("[dir]", dir)
    .replace("[name]", name)
    .replace("[hash]", hash)
    .split('/')
    .filter(|segment| !segment.is_empty() && *segment != ".")
    .collect::<Vec<_>>()
    .join("/")
}

/// 8 base32 characters derived from the content
pub fn content_hash(contents: &[u8]) -> String {
  let mut hash = BASE32_NOPAD.encode(&xxh3_64(contents).to_le_bytes());
  hash.truncate(HASH_LENGTH);
  hash
}

fn common_directory<'p>(mut dirs: impl Iterator<Item = &'p Path>) -> Option<PathBuf> {
  let mut common = dirs.next()?.to_path_buf();

  for dir in dirs {
    while !dir.starts_with(&common) {
      if !common.pop() {
        break;
      }
    }
  }

  Some(common)
}

fn line_count(code: &str) -> i64 {
  code.matches('\n').count() as i64
}

fn identifier(key: &str) -> String {
  key
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect()
}

fn mime_type(path: &str) -> &'static str {
  let extension = Path::new(path)
    .extension()
    .map(|extension| extension.to_string_lossy().to_lowercase())
    .unwrap_or_default();

  match extension.as_str() {
    "svg" => "image/svg+xml",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "avif" => "image/avif",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    _ => "application/octet-stream",
  }
}
