mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wagertoe_core::{GameClient, WagerError};

#[derive(Parser)]
#[command(name = "wagertoe")]
#[command(about = "Wagertoe - staked tic-tac-toe on an Ethereum ledger")]
#[command(version)]
struct Cli {
    /// Data directory for settings and action history
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON-RPC endpoint of the wallet node
    #[arg(long, global = true, env = "WAGERTOE_RPC_URL")]
    rpc_url: Option<String>,

    /// Address of the game contract
    #[arg(long, global = true, env = "WAGERTOE_CONTRACT")]
    contract: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Game(commands::GameCommands),

    /// Follow the game live as the ledger changes
    Watch,

    /// Interactive play
    Play,

    /// Saved settings
    #[command(subcommand)]
    Config(commands::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "wagertoe_core={},wagertoe={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(CliConfig::default_data_dir);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    let result = match cli.command {
        Commands::Config(cmd) => commands::handle_config_command(cmd, &data_dir).await,
        command => run(command, &data_dir, cli.rpc_url, cli.contract).await,
    };

    if let Err(e) = result {
        match e {
            WagerError::WalletUnavailable(reason) => {
                eprintln!("Error: No wallet account available ({})", reason);
                eprintln!("Unlock an account on the node, or point --rpc-url at one that has it");
            }
            WagerError::RemoteUnavailable(reason) => {
                eprintln!("Error: Could not reach the ledger: {}", reason);
                eprintln!("Check 'wagertoe config show' and that the node is running");
            }
            WagerError::Rejected { reason } => {
                eprintln!("Error: The ledger refused the action: {}", reason);
            }
            WagerError::InvalidMove(reason) => {
                eprintln!("Error: {}", reason);
                eprintln!("Use 'wagertoe status' to see the board");
            }
            WagerError::ActionInFlight => {
                eprintln!("Error: Another action is still waiting for confirmation");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(
    command: Commands,
    data_dir: &std::path::Path,
    rpc_url: Option<String>,
    contract: Option<String>,
) -> wagertoe_core::Result<()> {
    let settings = CliConfig::load(data_dir).await?;
    let config = settings.client_config(rpc_url, contract)?;
    let journal = settings.journal.then(|| data_dir.join("wagertoe.db"));

    let client = GameClient::open(config, journal.as_deref()).await?;
    client.connect().await?;

    let result = match command {
        Commands::Game(cmd) => commands::handle_game_command(cmd, &client).await,
        Commands::Watch => commands::watch(&client).await,
        Commands::Play => commands::play(&client).await,
        Commands::Config(_) => Ok(()),
    };

    client.disconnect().await;
    result
}
