use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studyroom-cli", version, about = "Studyroom Pomodoro CLI")]
struct Cli {
    /// Log timer transitions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
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
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Subject attached to upcoming sessions
    Subject {
        #[command(subcommand)]
        action: commands::subject::SubjectAction,
    },
    /// Recently completed sessions
    History {
        /// Maximum number of sessions to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "studyroom_core=info,studyroom_cli=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Subject { action } => commands::subject::run(action),
        Commands::History { limit } => commands::history::run(limit),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
