mod commands;
mod docker;
mod releases;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(
    about = "Build container images for blockchain node releases",
    long_about = "Build container images for blockchain node releases.\n\n\
                  By default the most recent releases of every chain in chains.yaml are\n\
                  built in parallel, and pushed when a registry is given."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// チェーンのイメージをビルド
    Build(commands::build::BuildArgs),
    /// 各チェーンの cosmos-sdk / ibc-go バージョンを一覧表示
    List(commands::list::ListArgs),
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::handle(args).await?,
        Commands::List(args) => commands::list::handle(args).await?,
        Commands::Version => {
            println!("shipwright {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
