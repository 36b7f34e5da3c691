use std::collections::BTreeSet;

/// Node.js builtin modules, which browser builds leave as imports
pub const BUILTIN_MODULES: [&str; 41] = [
  "assert",
  "async_hooks",
  "buffer",
  "child_process",
  "cluster",
  "console",
  "constants",
  "crypto",
  "dgram",
  "diagnostics_channel",
  "dns",
  "domain",
  "events",
  "fs",
  "http",
  "http2",
  "https",
  "inspector",
  "module",
  "net",
  "os",
  "path",
  "perf_hooks",
  "process",
  "punycode",
  "querystring",
  "readline",
  "repl",
  "stream",
  "string_decoder",
  "sys",
  "timers",
  "tls",
  "trace_events",
  "tty",
  "url",
  "util",
  "v8",
  "vm",
  "worker_threads",
  "zlib",
];

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompilerError {
  /// An application dependency has the name of a builtin module
  #[error(
    "The following dependencies share a name with a builtin module and would shadow it: {}. \
     Rename or remove them.",
    .dependencies.join(", ")
  )]
  BuiltinShadowed { dependencies: Vec<String> },
}

/// The builtin modules to leave external, failing if a dependency shadows one of them
pub fn get_externals(dependencies: &[String]) -> Result<BTreeSet<String>, CompilerError> {
  let mut shadowed = dependencies
    .iter()
    .filter(|dependency| BUILTIN_MODULES.contains(&dependency.as_str()))
    .cloned()
    .collect::<Vec<_>>();

  if !shadowed.is_empty() {
    shadowed.sort();
    shadowed.dedup();
    return Err(CompilerError::BuiltinShadowed {
      dependencies: shadowed,
    });
  }

  Ok(BUILTIN_MODULES.iter().map(|name| name.to_string()).collect())
}
