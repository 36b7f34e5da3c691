use std::collections::HashMap;

use parking_lot::Mutex;
use routepack_core::lexer::ImportRecord;
use xxhash_rust::xxh3::xxh3_64;

/// Work shared between a build and its incremental rebuilds, keyed by content hash
#[derive(Debug, Default)]
pub struct EngineCache {
  minified_css: Mutex<HashMap<u64, String>>,
  script_imports: Mutex<HashMap<u64, Vec<ImportRecord>>>,
  stats: Mutex<CacheStats>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
  pub hits: usize,
  pub misses: usize,
}

impl EngineCache {
  pub fn script_imports<F>(&self, code: &str, scan: F) -> Vec<ImportRecord>
  where
    F: FnOnce() -> Vec<ImportRecord>,
  {
    let key = xxh3_64(code.as_bytes());

    if let Some(records) = self.script_imports.lock().get(&key) {
      self.stats.lock().hits += 1;
      return records.clone();
    }

    self.stats.lock().misses += 1;
    let records = scan();
    self.script_imports.lock().insert(key, records.clone());
    records
  }

  pub fn minified_css<F>(&self, code: &str, minify: F) -> anyhow::Result<String>
  where
    F: FnOnce() -> anyhow::Result<String>,
  {
    let key = xxh3_64(code.as_bytes());

    if let Some(minified) = self.minified_css.lock().get(&key) {
      self.stats.lock().hits += 1;
      return Ok(minified.clone());
    }

    self.stats.lock().misses += 1;
    let minified = minify()?;
    self.minified_css.lock().insert(key, minified.clone());
    Ok(minified)
  }

  pub fn stats(&self) -> CacheStats {
    *self.stats.lock()
  }

  pub fn clear(&self) {
    self.minified_css.lock().clear();
    self.script_imports.lock().clear();
  }
}
