use async_trait::async_trait;

pub use build_options::*;
pub use build_result::*;
pub use metafile::*;

mod build_options;
mod build_result;
mod metafile;

/// A bundler that turns entry points into output files
#[mockall::automock]
#[async_trait]
pub trait Engine: Send + Sync {
  /// Runs a full build
  ///
  /// The returned handle keeps whatever state the engine needs to rebuild the same
  /// options incrementally.
  async fn build(&self, options: BuildOptions) -> anyhow::Result<Box<dyn BuildHandle>>;
}

/// The result of a build that can be rebuilt incrementally
#[mockall::automock]
#[async_trait]
pub trait BuildHandle: Send + Sync {
  fn result(&self) -> &BuildResult;

  /// Builds the same options again, reusing unchanged work
  ///
  /// On failure the current handle stays valid.
  async fn rebuild(&self) -> anyhow::Result<Box<dyn BuildHandle>>;

  /// Releases the state held for incremental rebuilds
  fn dispose(&self);
}
