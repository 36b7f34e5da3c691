use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;

use routepack_core::types::Loader;

use crate::module_graph::ImportTarget;
use crate::module_graph::ModuleGraph;

/// A group of script modules emitted as one JS file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
  /// Index into `ModuleGraph::entries` for entry chunks, `None` for shared chunks
  pub entry: Option<usize>,
  /// Script, JSON, text and asset modules, dependencies first
  pub modules: Vec<usize>,
  /// Stylesheet modules reachable from the entry, dependencies first
  pub stylesheets: Vec<usize>,
  /// Shared chunks this entry chunk loads, as indices into the chunk list
  pub shared: Vec<usize>,
}

/// Splits the graph into one chunk per entry plus shared chunks
///
/// With `splitting`, a module reachable from several entries moves into the shared chunk
/// of exactly that set of entries. Stylesheets are never shared: each entry collects all
/// stylesheets it reaches.
pub fn split_chunks(graph: &ModuleGraph, splitting: bool) -> Vec<Chunk> {
  let orders = graph
    .entries
    .iter()
    .map(|(_, module)| visit_order(graph, *module))
    .collect::<Vec<_>>();

  let mut membership: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
  let mut first_seen: Vec<usize> = Vec::new();

  for (entry, order) in orders.iter().enumerate() {
    for module in order {
      let entries = membership.entry(*module).or_default();
      if entries.is_empty() {
        first_seen.push(*module);
      }
      entries.insert(entry);
    }
  }

  let is_shared = |module: &usize| {
    splitting
      && graph.modules[*module].loader != Loader::Css
      && membership.get(module).is_some_and(|entries| entries.len() > 1)
  };

  let mut chunks: Vec<Chunk> = orders
    .iter()
    .enumerate()
    .map(|(entry, order)| Chunk {
      entry: Some(entry),
      modules: order
        .iter()
        .filter(|module| graph.modules[**module].loader != Loader::Css && !is_shared(module))
        .copied()
        .collect(),
      stylesheets: order
        .iter()
        .filter(|module| graph.modules[**module].loader == Loader::Css)
        .copied()
        .collect(),
      shared: Vec::new(),
    })
    .collect();

  let mut shared_order: Vec<BTreeSet<usize>> = Vec::new();
  let mut shared_modules: BTreeMap<BTreeSet<usize>, Vec<usize>> = BTreeMap::new();

  for module in first_seen.iter().filter(|module| is_shared(module)) {
    let Some(entries) = membership.get(module) else {
      continue;
    };

    if !shared_modules.contains_key(entries) {
      shared_order.push(entries.clone());
    }

    shared_modules.entry(entries.clone()).or_default().push(*module);
  }

  for entries in shared_order {
    let index = chunks.len();
    let modules = shared_modules.remove(&entries).unwrap_or_default();

    for entry in &entries {
      chunks[*entry].shared.push(index);
    }

    chunks.push(Chunk {
      entry: None,
      modules,
      stylesheets: Vec::new(),
      shared: Vec::new(),
    });
  }

  chunks
}

/// Depth-first post-order from `root`, so dependencies come before their importers
pub fn visit_order(graph: &ModuleGraph, root: usize) -> Vec<usize> {
  let mut order = Vec::new();
  let mut seen = HashSet::new();
  let mut stack = vec![(root, 0usize)];
  seen.insert(root);

  while let Some((module, next_import)) = stack.pop() {
    let imports = &graph.modules[module].imports;

    let next = imports[next_import.min(imports.len())..]
      .iter()
      .enumerate()
      .find_map(|(offset, import)| match import.target {
        ImportTarget::Module(target) if !seen.contains(&target) => {
          Some((next_import + offset, target))
        }
        _ => None,
      });

    match next {
      Some((position, target)) => {
        stack.push((module, position + 1));
        seen.insert(target);
        stack.push((target, 0));
      }
      None => order.push(module),
    }
  }

  order
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use pretty_assertions::assert_eq;
  use routepack_core::plugin::ResolveKind;

  use super::*;
  use crate::module_graph::Module;
  use crate::module_graph::ModuleImport;

  fn module(key: &str, loader: Loader, imports: &[usize]) -> Module {
    Module {
      key: key.to_string(),
      namespace: String::from("file"),
      path: format!("/app/{key}"),
      loader,
      source: Vec::new(),
      resolve_dir: PathBuf::from("/app"),
      plugin_data: None,
      imports: imports
        .iter()
        .map(|target| ModuleImport {
          specifier: format!("./{target}"),
          kind: ResolveKind::ImportStatement,
          span: 0..0,
          target: ImportTarget::Module(*target),
        })
        .collect(),
    }
  }

  fn graph() -> ModuleGraph {
    ModuleGraph {
      modules: vec![
        module("entry.client.tsx", Loader::Tsx, &[2, 3]),
        module("routes/index.tsx", Loader::Tsx, &[2, 4]),
        module("react.js", Loader::Js, &[]),
        module("root.css", Loader::Css, &[]),
        module("index.css", Loader::Css, &[3]),
      ],
      entries: vec![
        (String::from("entry.client"), 0),
        (String::from("routes/index"), 1),
      ],
    }
  }

  #[test]
  fn visits_dependencies_first() {
    assert_eq!(visit_order(&graph(), 1), vec![2, 3, 4, 1]);
  }

  #[test]
  fn without_splitting_every_entry_keeps_its_modules() {
    let chunks = split_chunks(&graph(), false);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].modules, vec![2, 0]);
    assert_eq!(chunks[1].modules, vec![2, 1]);
    assert_eq!(chunks[1].stylesheets, vec![3, 4]);
  }

  #[test]
  fn splitting_moves_shared_modules_into_a_shared_chunk() {
    let chunks = split_chunks(&graph(), true);

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].modules, vec![0]);
    assert_eq!(chunks[1].modules, vec![1]);
    assert_eq!(chunks[0].shared, vec![2]);
    assert_eq!(chunks[1].shared, vec![2]);
    assert_eq!(
      chunks[2],
      Chunk {
        entry: None,
        modules: vec![2],
        stylesheets: Vec::new(),
        shared: Vec::new(),
      }
    );
    assert_eq!(chunks[0].stylesheets, vec![3]);
  }
}
