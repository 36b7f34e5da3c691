use std::fmt::Display;
use std::fmt::Formatter;

use derive_builder::Builder;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::CodeFrame;

/// An error meant for the person running the build
///
/// Most diagnostics point at one or more source files through [`CodeFrame`]s.
#[derive(Builder, Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[builder(default, setter(into))]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  /// A summary user-facing message
  pub message: String,

  /// Indicates where this diagnostic was emitted from, usually a plugin name
  pub origin: Option<String>,

  /// A list of files with source-code highlights
  pub code_frames: Vec<CodeFrame>,

  /// Hints for the user
  pub hints: Vec<String>,

  /// URL for the user to refer to documentation
  #[serde(rename = "documentationURL")]
  pub documentation_url: Option<String>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

impl Diagnostic {
  /// Renders the message followed by `file:line:column` for every highlight
  pub fn to_pretty_string(&self) -> String {
    let mut output = self.message.clone();

    for label in self.code_frames.iter().flat_map(CodeFrame::labels) {
      output += &format!("\n  at {label}");
    }

    for hint in &self.hints {
      output += &format!("\n  hint: {hint}");
    }

    output
  }
}
