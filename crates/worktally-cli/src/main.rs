use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "worktally", version, about = "Worktally time tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Elapsed time tracking
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Focus/break cycle control
    Cycle {
        #[command(subcommand)]
        action: commands::cycle::CycleAction,
    },
    /// Time entry log
    Entries {
        #[command(subcommand)]
        action: commands::entries::EntriesAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WORKTALLY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Cycle { action } => commands::cycle::run(action),
        Commands::Entries { action } => commands::entries::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
