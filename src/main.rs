mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use holo::config::ServerConfig;

#[derive(Parser)]
#[command(name = "holo", version, about = "Your digital twin: a persona chat site backed by CORE")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Check holo.json and .env, then serve the current directory
    Dev,
    /// Validate holo.json
    Check,
    /// Create or update holo.json, .env and introduction.mdx
    Setup(cli::setup::SetupArgs),
    /// Manage the CORE labels the site draws on
    Labels {
        #[command(subcommand)]
        action: LabelsAction,
    },
    /// List the documents under a CORE label
    Documents {
        /// Label id; prompts when omitted
        #[arg(long)]
        label: Option<String>,
    },
}

#[derive(Subcommand)]
enum LabelsAction {
    /// List all labels, marking the selected ones
    List,
    /// Change the selected labels and rebuild the navigation
    Update {
        /// Label ids to select, comma separated; prompts when omitted
        #[arg(long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys usually live in .env next to holo.json.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = ServerConfig::load()?;

    // Logs go to stderr so command output on stdout stays clean.
    let filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let project_dir = settings.config_dir.clone();

    match cli.command {
        Command::Serve => holo::server::serve(settings).await?,
        Command::Dev => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            cli::dev::dev(&cwd, settings).await?;
        }
        Command::Check => cli::check::check(&project_dir)?,
        Command::Setup(args) => cli::setup::setup(&project_dir, args).await?,
        Command::Labels { action } => match action {
            LabelsAction::List => cli::labels::list(&project_dir).await?,
            LabelsAction::Update { labels } => cli::labels::update(&project_dir, labels).await?,
        },
        Command::Documents { label } => cli::documents::documents(&project_dir, label).await?,
    }

    Ok(())
}
