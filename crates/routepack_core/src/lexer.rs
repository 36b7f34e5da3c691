//! A lightweight, regex based scanner for module syntax.
//!
//! It only recognises the statement forms routepack needs to walk a module graph and
//! to decide which names a route module exports. It does not parse JavaScript.
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r#"(?m)^[ \t]*(?:import|export)\s+(?:type\s+)?(?:[\w*${}\s,]+?\s+from\s+)?["']([^"'\n]+)["'][ \t]*;?"#,
  )
  .unwrap()
});

static DYNAMIC_IMPORT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"\bimport\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap());

static REQUIRE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"\brequire\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap());

static EXPORT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var)\s+([A-Za-z_$][\w$]*)",
  )
  .unwrap()
});

static EXPORT_DEFAULT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^[ \t]*export\s+default\b").unwrap());

static EXPORT_LIST: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^[ \t]*export\s+(?:type\s+)?\{([^}]*)\}").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
  /// `import ... from "x"`, `import "x"` and `export ... from "x"`
  Static,
  /// `import("x")`
  Dynamic,
  /// `require("x")`
  Require,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRecord {
  pub specifier: String,
  pub kind: ImportKind,
  /// Byte range of the whole statement or call expression
  pub span: Range<usize>,
}

/// Every import in source order
pub fn imports(code: &str) -> Vec<ImportRecord> {
  let mut records = Vec::new();

  for (regex, kind) in [
    (&*STATIC_IMPORT, ImportKind::Static),
    (&*DYNAMIC_IMPORT, ImportKind::Dynamic),
    (&*REQUIRE, ImportKind::Require),
  ] {
    for captures in regex.captures_iter(code) {
      let (Some(statement), Some(specifier)) = (captures.get(0), captures.get(1)) else {
        continue;
      };

      records.push(ImportRecord {
        specifier: specifier.as_str().to_string(),
        kind,
        span: statement.range(),
      });
    }
  }

  records.sort_by_key(|record| record.span.start);
  records
}

/// Every name a module exports, in source order and without duplicates
///
/// `export * from` re-exports cannot be named without reading the target and are skipped.
pub fn exports(code: &str) -> Vec<String> {
  let mut found: Vec<(usize, String)> = Vec::new();

  for captures in EXPORT_DECLARATION.captures_iter(code) {
    if let Some(name) = captures.get(1) {
      found.push((name.start(), name.as_str().to_string()));
    }
  }

  for matched in EXPORT_DEFAULT.find_iter(code) {
    found.push((matched.start(), String::from("default")));
  }

  for captures in EXPORT_LIST.captures_iter(code) {
    let Some(list) = captures.get(1) else {
      continue;
    };

    for specifier in list.as_str().split(',') {
      let specifier = specifier.trim();
      if specifier.is_empty() {
        continue;
      }

      let exported = specifier
        .rsplit_once(" as ")
        .map(|(_, exported)| exported)
        .unwrap_or(specifier)
        .trim_start_matches("type ")
        .trim();

      found.push((list.start(), exported.to_string()));
    }
  }

  found.sort_by_key(|(position, _)| *position);

  let mut names: Vec<String> = Vec::with_capacity(found.len());
  for (_, name) in found {
    if !names.contains(&name) {
      names.push(name);
    }
  }

  names
}
