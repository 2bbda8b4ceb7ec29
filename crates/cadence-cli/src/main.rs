use clap::{Parser, Subcommand};

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "cadence-cli", version, about = "Cadence CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Break control
    Break {
        #[command(subcommand)]
        action: commands::breaks::BreakAction,
    },
    /// Session project management
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Completed-session statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Multi-device synchronization
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Run the engine in the foreground and print events as JSON lines
    Watch,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Break { action } => commands::breaks::run(action).await,
        Commands::Project { action } => commands::project::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Sync { action } => commands::sync::run(action).await,
        Commands::Watch => commands::watch::run().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
