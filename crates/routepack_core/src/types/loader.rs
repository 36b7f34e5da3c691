use serde::Deserialize;
use serde::Serialize;

/// Decides how the engine interprets the contents of a module
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Loader {
  #[default]
  Js,
  Jsx,
  Ts,
  Tsx,
  Css,
  Json,
  Text,
  /// Copied to the assets directory, the module evaluates to its public URL
  File,
  DataUrl,
  /// Contributes nothing to the output
  Empty,
}

impl Loader {
  /// The default loader for a file extension, if any
  pub fn from_extension(extension: &str) -> Option<Loader> {
    let loader = match extension {
      "js" | "mjs" | "cjs" => Loader::Js,
      "jsx" => Loader::Jsx,
      "ts" | "mts" | "cts" => Loader::Ts,
      "tsx" => Loader::Tsx,
      "css" => Loader::Css,
      "json" => Loader::Json,
      "txt" | "md" => Loader::Text,
      "avif" | "gif" | "ico" | "jpeg" | "jpg" | "png" | "svg" | "webp" | "woff" | "woff2"
      | "ttf" | "otf" | "eot" | "mp3" | "mp4" | "webm" | "wav" | "pdf" | "wasm" => Loader::File,
      _ => return None,
    };

    Some(loader)
  }

  pub fn is_script(&self) -> bool {
    matches!(self, Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx)
  }
}
