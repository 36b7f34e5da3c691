use std::collections::BTreeMap;
use std::collections::BTreeSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use routepack_core::hash::hash_parts;

/// Length of generated production names and of the development hash suffix
pub const HASH_LENGTH: usize = 5;

/// Turns a hash into a short name that is a valid CSS identifier
///
/// Identifiers may not start with a digit, and a leading `-` followed by a digit is not
/// an identifier either, so both are replaced by `_`.
pub fn short_name(hash: u64) -> String {
  let encoded = URL_SAFE_NO_PAD.encode(hash.to_le_bytes());
  let name: String = encoded.chars().take(HASH_LENGTH).collect();
  to_identifier(name)
}

fn to_identifier(name: String) -> String {
  match name.chars().next() {
    Some(first) if first.is_ascii_digit() || first == '-' => format!("_{}", &name[1..]),
    _ => name,
  }
}

/// Production names: one short hash per local name
///
/// Hashes derive from the project relative path, the local name and the file content.
/// Locals are visited in sorted order and a colliding name is re-hashed with a counter,
/// so the outcome stays deterministic.
pub fn production_names(
  relative_path: &str,
  content: &str,
  locals: &BTreeSet<String>,
) -> BTreeMap<String, String> {
  assign_names(locals, |local, attempt| {
    let hash = if attempt == 0 {
      hash_parts([relative_path, local, content])
    } else {
      hash_parts([relative_path, local, content, &attempt.to_string()])
    };

    short_name(hash)
  })
}

fn assign_names<F>(locals: &BTreeSet<String>, name_for: F) -> BTreeMap<String, String>
where
  F: Fn(&str, u32) -> String,
{
  let mut taken = BTreeSet::new();
  let mut names = BTreeMap::new();

  for local in locals {
    let mut attempt = 0;
    let mut name = name_for(local, attempt);

    while taken.contains(&name) {
      attempt += 1;
      name = name_for(local, attempt);
    }

    taken.insert(name.clone());
    names.insert(local.clone(), name);
  }

  names
}

/// Development name template: `<file stem>__[local]__<hash>`
///
/// The stem drops the `.module.css` suffix. The hash derives from the path and content.
pub fn development_pattern(file_name: &str, relative_path: &str, content: &str) -> String {
  let stem = file_name
    .strip_suffix(".css")
    .unwrap_or(file_name)
    .trim_end_matches(".module");

  let stem: String = stem
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();

  let hash = short_name(hash_parts([relative_path, content]));

  format!("{stem}__[local]__{hash}")
}
