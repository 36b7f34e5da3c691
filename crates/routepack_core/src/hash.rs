use xxhash_rust::xxh3::xxh3_64;
use xxhash_rust::xxh3::Xxh3;

/// routepack uses xxh3 for every identifier that ends up in output files or names.
///
/// The hashes need to be stable across runs, machines and platforms since they are
/// written into file names, class names and the manifest version.
pub type IdentifierHasher = Xxh3;

pub fn hash_string(s: String) -> String {
  hash_bytes(s.as_bytes())
}

pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}

/// Hashes several byte slices, separating them so `["ab", "c"]` and `["a", "bc"]` differ
pub fn hash_parts<I, P>(parts: I) -> u64
where
  I: IntoIterator<Item = P>,
  P: AsRef<[u8]>,
{
  let mut hasher = IdentifierHasher::new();
  for part in parts {
    hasher.update(part.as_ref());
    hasher.update(&[0]);
  }
  hasher.digest()
}
