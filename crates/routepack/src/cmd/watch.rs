use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use clap::Parser;
use jwalk::WalkDir;
use routepack::channel::Channel;
use routepack::compiler::CompileQueue;
use tracing::debug;
use tracing::info;

use super::report;
use super::ProjectArgs;

#[derive(Debug, Parser)]
pub struct WatchCommand {
  #[command(flatten)]
  pub project: ProjectArgs,
  /// Milliseconds between scans of the app directory
  #[arg(long, default_value_t = 250)]
  pub poll_interval: u64,
}

/// Modification time and size of every file below a directory
type Snapshot = BTreeMap<PathBuf, (Option<SystemTime>, u64)>;

pub async fn main(cmd: WatchCommand) -> anyhow::Result<()> {
  let compiler = cmd.project.create_compiler()?;
  let app_directory = compiler.config().app_directory.clone();
  let queue = Arc::new(CompileQueue::new(compiler, Arc::new(Channel::new())));

  let mut snapshot = scan(app_directory.clone()).await?;
  compile(&queue).await;

  let mut interval = tokio::time::interval(Duration::from_millis(cmd.poll_interval));
  info!(directory = %app_directory.display(), "Watching for changes");

  loop {
    tokio::select! {
      _ = interval.tick() => {}
      _ = tokio::signal::ctrl_c() => break,
    }

    let next = scan(app_directory.clone()).await?;
    if next == snapshot {
      continue;
    }

    debug!(changed = changed_files(&snapshot, &next).len(), "Detected changes");
    snapshot = next;
    compile(&queue).await;
  }

  queue.dispose().await;
  Ok(())
}

/// Compiles once, logging rather than returning failures so watching continues
async fn compile(queue: &CompileQueue) {
  match queue.compile().await {
    Ok(manifest) => info!(url = %manifest.url, "Published manifest"),
    Err(error) => report(&error),
  }
}

async fn scan(directory: PathBuf) -> anyhow::Result<Snapshot> {
  Ok(tokio::task::spawn_blocking(move || snapshot(&directory)).await?)
}

fn snapshot(directory: &Path) -> Snapshot {
  WalkDir::new(directory)
    .skip_hidden(true)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|entry| entry.file_type().is_file())
    .filter_map(|entry| {
      let metadata = entry.metadata().ok()?;
      Some((entry.path(), (metadata.modified().ok(), metadata.len())))
    })
    .collect()
}

fn changed_files(previous: &Snapshot, next: &Snapshot) -> Vec<PathBuf> {
  next
    .iter()
    .filter(|&(path, stamp)| previous.get(path) != Some(stamp))
    .map(|(path, _)| path.clone())
    .chain(
      previous
        .keys()
        .filter(|path| !next.contains_key(*path))
        .cloned(),
    )
    .collect()
}
