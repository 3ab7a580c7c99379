use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, GroupCommand, QuizCommand};
use quizdeck::access::Backend;
use quizdeck::config::Config;
use quizdeck::db::{init_db, DocumentStore};

#[derive(Parser)]
#[command(name = "quizdeck")]
#[command(version)]
#[command(about = "Author quizzes and manage study groups", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage quizzes
    Quiz(QuizCommand),

    /// Manage study groups
    Group(GroupCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizdeck=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn open_backend(config: &Config) -> Result<Backend, Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path.value).await?;
    Ok(Backend::new(DocumentStore::new(pool)))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Quiz(cmd)) => {
            let backend = open_backend(&config).await?;
            cmd.run(&backend.quizzes, &config).await?;
        }
        Some(Commands::Group(cmd)) => {
            let backend = open_backend(&config).await?;
            cmd.run(&backend.groups, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
