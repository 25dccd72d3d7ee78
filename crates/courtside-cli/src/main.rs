use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "courtside", version, about = "Courtside shared training timers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shared circuit timer
    Circuit {
        #[command(subcommand)]
        action: commands::circuit::CircuitAction,
    },
    /// Shared stretch timers (dynamic and static tracks)
    Stretch {
        #[command(subcommand)]
        action: commands::stretch::StretchAction,
    },
    /// Local per-drill countdown
    Drill {
        #[command(subcommand)]
        action: commands::drill::DrillAction,
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
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Circuit { action } => commands::circuit::run(action),
        Commands::Stretch { action } => commands::stretch::run(action),
        Commands::Drill { action } => commands::drill::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
