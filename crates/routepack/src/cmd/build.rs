use clap::Parser;
use routepack::channel::Channel;

use super::ProjectArgs;

#[derive(Debug, Parser)]
pub struct BuildCommand {
  #[command(flatten)]
  pub project: ProjectArgs,
}

pub async fn main(cmd: BuildCommand) -> anyhow::Result<()> {
  let mut compiler = cmd.project.create_compiler()?;
  let channel = Channel::new();

  let result = compiler.compile(&channel).await;
  compiler.dispose();

  let manifest = result?;
  println!("{}", manifest.url);

  Ok(())
}
