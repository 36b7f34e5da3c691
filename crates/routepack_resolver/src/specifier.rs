use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// A parsed import specifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Specifier {
  /// `./a`, `../a`, `.` or `..`
  Relative(PathBuf),
  /// `/a/b`
  Absolute(PathBuf),
  /// `react`, `@remix-run/react/dist/index.js`: package name and subpath
  Package(String, String),
}

impl Specifier {
  /// Parses a specifier, dropping any `?query` or `#hash` suffix
  pub fn parse(specifier: &str) -> Specifier {
    let specifier = strip_suffix(specifier);

    if specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
    {
      return Specifier::Relative(PathBuf::from(specifier));
    }

    if Path::new(specifier).is_absolute() {
      return Specifier::Absolute(PathBuf::from(specifier));
    }

    let (package, subpath) = split_package(specifier);
    Specifier::Package(package.to_string(), subpath.to_string())
  }
}

pub fn strip_suffix(specifier: &str) -> &str {
  let end = specifier.find(['?', '#']).unwrap_or(specifier.len());
  &specifier[..end]
}

fn split_package(specifier: &str) -> (&str, &str) {
  let mut separators = specifier.match_indices('/').map(|(index, _)| index);

  let end = if specifier.starts_with('@') {
    separators.nth(1)
  } else {
    separators.next()
  };

  match end {
    Some(end) => (&specifier[..end], &specifier[end + 1..]),
    None => (specifier, ""),
  }
}

/// Removes `.` and `..` segments without touching the file-system
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut result: Vec<Component<'_>> = Vec::new();

  for component in path.components() {
    match component {
      Component::Prefix(prefix) => {
        result = vec![Component::Prefix(prefix)];
      }
      Component::RootDir => {
        result.push(Component::RootDir);
      }
      Component::CurDir => {}
      Component::ParentDir => {
        if matches!(result.last(), Some(Component::Normal(_))) {
          result.pop();
        }
      }
      Component::Normal(segment) => {
        result.push(Component::Normal(segment));
      }
    }
  }

  PathBuf::from_iter(result)
}
