use std::fmt::Display;

/// The two bundling sessions a compile drives
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BuildTarget {
  /// Client entry plus one entry per route, with code splitting
  Application,
  /// The single aggregate stylesheet fed by every scoped stylesheet
  StylesheetBundle,
}

impl Display for BuildTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      BuildTarget::Application => write!(f, "app"),
      BuildTarget::StylesheetBundle => write!(f, "css"),
    }
  }
}
