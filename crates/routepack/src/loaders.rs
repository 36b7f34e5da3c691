use std::collections::BTreeMap;

use routepack_core::types::Loader;

/// Extension to loader table of browser builds
///
/// Stylesheets keep the engine's CSS loader; the plain stylesheet plugin turns the ones
/// imported from scripts into assets.
pub fn loaders() -> BTreeMap<String, Loader> {
  let mut loaders = BTreeMap::new();

  for extension in [
    "aac", "avif", "csv", "eot", "fbx", "flac", "gif", "glb", "gltf", "gz", "ico", "jpeg",
    "jpg", "m4a", "mov", "mp3", "mp4", "ogg", "otf", "pdf", "png", "svg", "ttf", "wasm", "wav",
    "webm", "webp", "woff", "woff2",
  ] {
    loaders.insert(extension.to_string(), Loader::File);
  }

  loaders.insert(String::from("js"), Loader::Jsx);
  loaders.insert(String::from("jsx"), Loader::Jsx);
  loaders.insert(String::from("ts"), Loader::Ts);
  loaders.insert(String::from("tsx"), Loader::Tsx);
  loaders.insert(String::from("json"), Loader::Json);
  loaders.insert(String::from("md"), Loader::Text);
  loaders.insert(String::from("txt"), Loader::Text);

  loaders
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn images_are_assets() {
    let loaders = loaders();

    assert_eq!(loaders.get("css"), None);
    assert_eq!(loaders.get("svg"), Some(&Loader::File));
    assert_eq!(loaders.get("js"), Some(&Loader::Jsx));
    assert_eq!(loaders.get("mdx"), None);
  }
}
