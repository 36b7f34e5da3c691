mod cmd;

use clap::Parser;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum RoutepackCommandType {
  /// Compile the browser build once
  Build(cmd::build::BuildCommand),
  /// Compile, then compile again whenever a file in the app directory changes
  Watch(cmd::watch::WatchCommand),
}

#[derive(Parser, Debug)]
#[command(name = "routepack", version)]
pub struct RoutepackCommand {
  #[clap(subcommand)]
  pub command: RoutepackCommandType,
  /// [possible values: "error", "warn", "info", "debug", "trace"]
  #[arg(long, env = "RUST_LOG", global = true)]
  pub _rust_log: Option<String>,
}

fn main() -> anyhow::Result<()> {
  routepack_monitoring::initialize_from_env()?;

  let args = RoutepackCommand::parse();
  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?;

  let result = runtime.block_on(async move {
    match args.command {
      RoutepackCommandType::Build(cmd) => cmd::build::main(cmd).await,
      RoutepackCommandType::Watch(cmd) => cmd::watch::main(cmd).await,
    }
  });

  if let Err(error) = &result {
    cmd::report(error);
  }

  routepack_monitoring::close_monitoring();
  result
}
