use std::ops::Range;
use std::sync::LazyLock;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::MinifyOptions;
use lightningcss::stylesheet::ParserOptions;
use lightningcss::stylesheet::StyleSheet;
use regex::Regex;
use routepack_core::plugin::ResolveKind;

static IMPORT_RULE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"'\n]+)["']\s*\)?[^;]*;"#).unwrap()
});

static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"url\(\s*(?:"([^"\n]*)"|'([^'\n]*)'|([^)\s"']+))\s*\)"#).unwrap()
});

#[derive(Clone, Debug, PartialEq)]
pub struct CssReference {
  pub specifier: String,
  pub kind: ResolveKind,
  /// The whole `@import` rule, or the whole `url(...)` token
  pub span: Range<usize>,
}

/// `@import` rules and `url()` references that point at bundleable files
pub fn imports(code: &str) -> Vec<CssReference> {
  let mut references = Vec::new();

  for captures in IMPORT_RULE.captures_iter(code) {
    let (Some(rule), Some(specifier)) = (captures.get(0), captures.get(1)) else {
      continue;
    };

    references.push(CssReference {
      specifier: specifier.as_str().to_string(),
      kind: ResolveKind::ImportRule,
      span: rule.range(),
    });
  }

  for captures in URL_TOKEN.captures_iter(code) {
    let Some(token) = captures.get(0) else {
      continue;
    };

    let inside_import = references
      .iter()
      .any(|reference| reference.span.contains(&token.start()));

    let specifier = captures
      .get(1)
      .or_else(|| captures.get(2))
      .or_else(|| captures.get(3))
      .map(|specifier| specifier.as_str().trim())
      .unwrap_or_default();

    if inside_import || !is_bundleable_url(specifier) {
      continue;
    }

    references.push(CssReference {
      specifier: specifier.to_string(),
      kind: ResolveKind::UrlToken,
      span: token.range(),
    });
  }

  references.sort_by_key(|reference| reference.span.start);
  references
}

fn is_bundleable_url(url: &str) -> bool {
  !(url.is_empty()
    || url.starts_with("data:")
    || url.starts_with("http:")
    || url.starts_with("https:")
    || url.starts_with('/')
    || url.starts_with('#'))
}

/// Minifies a stylesheet with lightningcss
pub fn minify(code: &str, filename: &str) -> anyhow::Result<String> {
  let mut stylesheet = StyleSheet::parse(
    code,
    ParserOptions {
      filename: filename.to_string(),
      ..ParserOptions::default()
    },
  )
  .map_err(|error| anyhow::anyhow!("Failed to minify {filename}: {error}"))?;

  stylesheet
    .minify(MinifyOptions::default())
    .map_err(|error| anyhow::anyhow!("Failed to minify {filename}: {error}"))?;

  let printed = stylesheet
    .to_css(PrinterOptions {
      minify: true,
      ..PrinterOptions::default()
    })
    .map_err(|error| anyhow::anyhow!("Failed to minify {filename}: {error}"))?;

  Ok(printed.code)
}
