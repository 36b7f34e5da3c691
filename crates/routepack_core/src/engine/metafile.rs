use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::plugin::ResolveKind;

/// Describes the module graph of a build and how it maps onto output files
///
/// Every key is a path relative to the working directory using forward slashes. Modules
/// outside the file namespace are prefixed with `<namespace>:`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metafile {
  pub inputs: BTreeMap<String, MetafileInput>,
  pub outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileInput {
  pub bytes: usize,
  pub imports: Vec<MetafileImport>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileImport {
  pub path: String,
  pub kind: ResolveKind,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub external: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutput {
  pub bytes: usize,
  pub inputs: BTreeMap<String, MetafileOutputInput>,

  /// Other outputs and externals this output loads
  pub imports: Vec<MetafileImport>,

  /// Names exported by the entry module, empty for chunks and assets
  pub exports: Vec<String>,

  /// Input key of the entry module when this output is an entry
  #[serde(skip_serializing_if = "Option::is_none")]
  pub entry_point: Option<String>,

  /// Logical entry name when this output is an entry
  #[serde(skip_serializing_if = "Option::is_none")]
  pub entry_name: Option<String>,

  /// Output key of the stylesheet collected for this entry
  #[serde(skip_serializing_if = "Option::is_none")]
  pub css_bundle: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutputInput {
  pub bytes_in_output: usize,
}

impl Metafile {
  /// The output produced for an entry name
  pub fn entry_output(&self, entry_name: &str) -> Option<(&String, &MetafileOutput)> {
    self
      .outputs
      .iter()
      .find(|(_, output)| output.entry_name.as_deref() == Some(entry_name))
  }
}
