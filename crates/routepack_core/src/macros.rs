/// Builds a [`crate::diagnostic::Diagnostic`] from a format string or a `DiagnosticBuilder`
#[macro_export]
macro_rules! diagnostic {
  ($fmt:literal $(, $args:expr)* $(,)?) => {
    $crate::diagnostic::Diagnostic {
      message: format!($fmt $(, $args)*),
      ..::std::default::Default::default()
    }
  };
  ($builder:expr) => {
    match $builder.build() {
      Ok(diagnostic) => diagnostic,
      Err(error) => $crate::diagnostic::Diagnostic {
        message: error.to_string(),
        ..::std::default::Default::default()
      },
    }
  };
}

/// Same as [`diagnostic!`], wrapped into an `anyhow::Error`
#[macro_export]
macro_rules! diagnostic_error {
  ($fmt:literal $(, $args:expr)* $(,)?) => {
    ::anyhow::Error::new($crate::diagnostic!($fmt $(, $args)*))
  };
  ($builder:expr) => {
    ::anyhow::Error::new($crate::diagnostic!($builder))
  };
}
