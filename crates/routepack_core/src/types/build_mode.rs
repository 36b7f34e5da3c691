use std::fmt::Display;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
  #[default]
  Development,
  Production,
}

impl BuildMode {
  pub fn is_production(&self) -> bool {
    matches!(self, BuildMode::Production)
  }

  pub fn is_development(&self) -> bool {
    matches!(self, BuildMode::Development)
  }
}

impl Display for BuildMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      BuildMode::Development => write!(f, "development"),
      BuildMode::Production => write!(f, "production"),
    }
  }
}

impl<'de> Deserialize<'de> for BuildMode {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;

    match s.to_lowercase().as_str() {
      "development" | "dev" => Ok(BuildMode::Development),
      "production" | "prod" => Ok(BuildMode::Production),
      other => Err(serde::de::Error::custom(format!(
        "Unknown build mode {other}, expected development or production"
      ))),
    }
  }
}
