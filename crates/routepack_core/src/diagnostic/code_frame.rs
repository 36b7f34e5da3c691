use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::types::Location;

/// A source file a diagnostic points into
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFrame {
  pub file_path: Option<PathBuf>,

  /// File contents as they were when the error was raised
  pub code: Option<String>,

  pub code_highlights: Vec<CodeHighlight>,
}

impl CodeFrame {
  pub fn new(file_path: PathBuf, code: String) -> Self {
    Self {
      file_path: Some(file_path),
      code: Some(code),
      code_highlights: Vec::new(),
    }
  }

  /// `file` for frames without highlights, otherwise one `file:line:column` per highlight
  pub fn labels(&self) -> Vec<String> {
    let file = self
      .file_path
      .as_ref()
      .map(|path| path.display().to_string())
      .unwrap_or_else(|| String::from("<unknown>"));

    if self.code_highlights.is_empty() {
      return vec![file];
    }

    self
      .code_highlights
      .iter()
      .map(|highlight| match &highlight.message {
        Some(message) => format!("{file}:{} {message}", highlight.start),
        None => format!("{file}:{}", highlight.start),
      })
      .collect()
  }
}

/// A file without its contents, for errors that are about the file as a whole
impl From<PathBuf> for CodeFrame {
  fn from(file_path: PathBuf) -> Self {
    Self {
      file_path: Some(file_path),
      ..Self::default()
    }
  }
}

/// A range within a [`CodeFrame`], with an optional note
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CodeHighlight {
  pub start: Location,
  pub end: Location,
  pub message: Option<String>,
}

/// A single `[line, column]` position
impl From<[usize; 2]> for CodeHighlight {
  fn from([line, column]: [usize; 2]) -> Self {
    let location = Location { line, column };

    Self {
      start: location.clone(),
      end: location,
      message: None,
    }
  }
}
