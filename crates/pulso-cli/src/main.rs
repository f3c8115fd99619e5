//! Pulso CLI - drive a live-coding score arena from the command line.

mod commands;
mod session;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pulso")]
#[command(author, version, about = "Pulso live-coding runtime CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted three-thread session and print the event log
    Demo(commands::demo::DemoArgs),

    /// Print the computed arena layout for a session config
    Layout(commands::layout::LayoutArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo(args) => commands::demo::run(args),
        Commands::Layout(args) => commands::layout::run(args),
    }
}
