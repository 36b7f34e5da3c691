use tokio::sync::watch;

/// Hands the latest value from one writer to any number of readers
///
/// Writing never waits for readers and works without any. Readers that attach late see the
/// most recent value.
#[derive(Debug)]
pub struct Channel<T> {
  sender: watch::Sender<Option<T>>,
}

impl<T: Clone> Default for Channel<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone> Channel<T> {
  pub fn new() -> Self {
    let (sender, _) = watch::channel(None);
    Self { sender }
  }

  pub fn write(&self, value: T) {
    self.sender.send_replace(Some(value));
  }

  /// Waits until a value has been written and returns the latest one
  pub async fn read(&self) -> anyhow::Result<T> {
    self.subscribe().read().await
  }

  pub fn subscribe(&self) -> ChannelReader<T> {
    ChannelReader {
      receiver: self.sender.subscribe(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct ChannelReader<T> {
  receiver: watch::Receiver<Option<T>>,
}

impl<T: Clone> ChannelReader<T> {
  /// Waits until a value has been written and returns the latest one
  pub async fn read(&mut self) -> anyhow::Result<T> {
    let value = self
      .receiver
      .wait_for(Option::is_some)
      .await
      .map_err(|_| anyhow::anyhow!("Channel closed before a value was written"))?;

    value
      .clone()
      .ok_or_else(|| anyhow::anyhow!("Channel closed before a value was written"))
  }

  /// Waits for a value written after the last one this reader saw
  pub async fn next(&mut self) -> anyhow::Result<T> {
    self
      .receiver
      .changed()
      .await
      .map_err(|_| anyhow::anyhow!("Channel closed"))?;

    self.read().await
  }
}
