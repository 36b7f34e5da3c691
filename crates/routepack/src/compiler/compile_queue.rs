use std::sync::Arc;

use tokio::sync::Mutex;

use super::BrowserCompiler;
use crate::channel::Channel;
use crate::manifest::Manifest;

/// Runs compiles one at a time for drivers that trigger them concurrently
///
/// A compile requested while another runs waits for it to finish. Nothing is cancelled.
#[derive(Debug)]
pub struct CompileQueue {
  channel: Arc<Channel<Manifest>>,
  compiler: Mutex<BrowserCompiler>,
}

impl CompileQueue {
  pub fn new(compiler: BrowserCompiler, channel: Arc<Channel<Manifest>>) -> Self {
    Self {
      channel,
      compiler: Mutex::new(compiler),
    }
  }

  pub fn channel(&self) -> &Arc<Channel<Manifest>> {
    &self.channel
  }

  pub async fn compile(&self) -> anyhow::Result<Manifest> {
    let mut compiler = self.compiler.lock().await;
    compiler.compile(&self.channel).await
  }

  pub async fn dispose(&self) {
    self.compiler.lock().await.dispose();
  }
}
