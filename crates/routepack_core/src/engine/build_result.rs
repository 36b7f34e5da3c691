use std::path::PathBuf;

use super::Metafile;
use crate::diagnostic::Diagnostic;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildResult {
  pub metafile: Option<Metafile>,

  /// Every output of the build, whether or not it was written to disk
  pub output_files: Vec<OutputFile>,

  pub warnings: Vec<Diagnostic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputFile {
  /// Absolute path the file is (or would be) written to
  pub path: PathBuf,
  pub contents: Vec<u8>,
}

impl OutputFile {
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.contents).into_owned()
  }

  pub fn has_extension(&self, suffix: &str) -> bool {
    self.path.to_string_lossy().ends_with(suffix)
  }
}
