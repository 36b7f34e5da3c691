use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;
use thiserror::Error;

use super::Diagnostic;

/// A group of diagnostics raised together, for example every failing module of a build
#[derive(Error, Default, Debug, Clone, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn as_ref(&self) -> &Vec<Diagnostic> {
    &self.0
  }

  pub fn into_inner(self) -> Vec<Diagnostic> {
    self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Turns any error into diagnostics, keeping `Diagnostic` payloads intact
  pub fn from_error(error: anyhow::Error) -> Self {
    match error.downcast::<Diagnostics>() {
      Ok(diagnostics) => diagnostics,
      Err(error) => match error.downcast::<Diagnostic>() {
        Ok(diagnostic) => Diagnostics(vec![diagnostic]),
        Err(error) => Diagnostics(vec![Diagnostic {
          message: format!("{error:#}"),
          ..Diagnostic::default()
        }]),
      },
    }
  }
}

impl Display for Diagnostics {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut output = String::new();
    for diagnostic in &self.0 {
      output += &format!("{}\n", diagnostic);
    }
    write!(f, "{}", output.trim_end())
  }
}

impl Serialize for Diagnostics {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.0.serialize(serializer)
  }
}

impl From<Vec<Diagnostic>> for Diagnostics {
  fn from(diagnostics: Vec<Diagnostic>) -> Self {
    Diagnostics(diagnostics)
  }
}

impl From<Diagnostic> for Diagnostics {
  fn from(diagnostic: Diagnostic) -> Self {
    Diagnostics(vec![diagnostic])
  }
}
