use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use wagertoe_core::{GameClient, GameId, Phase, Result, SessionState, TxReceipt, Wei};

#[derive(Subcommand)]
pub enum GameCommands {
    /// Connect to the wallet and show the active account
    Accounts,
    /// Show the current game
    Status {
        /// Print the session snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// List games waiting for an opponent
    Lobby,
    /// Open a new game with a stake in ETH
    Create {
        /// Stake in ETH, e.g. 0.05
        stake: String,
    },
    /// Join a pending game at its creator's stake
    Join {
        /// Game id from the lobby
        id: u64,
    },
    /// Withdraw a game nobody has joined yet
    Leave,
    /// Place your mark on a cell (0-8, row by row)
    Move {
        /// Cell index
        #[arg(value_parser = clap::value_parser!(u8).range(0..=8))]
        position: u8,
    },
    /// Claim the stake after your opponent timed out
    Claim,
    /// Re-read the game from the ledger
    Sync,
    /// Show locally recorded actions
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn handle_game_command(cmd: GameCommands, client: &GameClient) -> Result<()> {
    match cmd {
        GameCommands::Accounts => {
            let state = client.state();
            match state.identity {
                Some(identity) => println!("Connected account: {}", identity),
                None => println!("No account connected."),
            }
        }

        GameCommands::Status { json } => {
            let state = client.state();
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_state(&state);
            }
        }

        GameCommands::Lobby => {
            print_lobby(&client.state());
        }

        GameCommands::Create { stake } => {
            let stake = Wei::parse_ether(&stake)?;
            println!("Creating game with stake {}...", stake);
            let receipt = client.create_game(stake).await?;
            print_receipt(&receipt);
            let state = client.state();
            println!("Game {} created. Waiting for an opponent.", state.active_game_id);
        }

        GameCommands::Join { id } => {
            let id = GameId(id);
            println!("Joining game {}...", id);
            let receipt = client.join_game(id).await?;
            print_receipt(&receipt);
            print_state(&client.state());
        }

        GameCommands::Leave => {
            println!("Leaving pending game...");
            let receipt = client.leave_game().await?;
            print_receipt(&receipt);
            println!("Stake returned. Back in the lobby.");
        }

        GameCommands::Move { position } => {
            println!("Placing mark on cell {}...", position);
            let receipt = client.make_move(position).await?;
            print_receipt(&receipt);
            print_state(&client.state());
        }

        GameCommands::Claim => {
            let state = client.state();
            if !state.can_claim_win() {
                println!("Note: the opponent's move window has not visibly run out.");
            }
            println!("Claiming win...");
            let receipt = client.claim_win().await?;
            print_receipt(&receipt);
            println!("Win claimed. Back in the lobby.");
        }

        GameCommands::Sync => {
            let state = client.sync_now().await?;
            println!("Synced with ledger.");
            print_state(&state);
        }

        GameCommands::History { limit } => {
            let entries = client.history(limit).await?;

            if entries.is_empty() {
                println!("No recorded actions.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Submitted", "Action", "Status", "Tx", "Detail"]);

            for entry in entries {
                table.add_row(vec![
                    entry.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    entry.action.to_string(),
                    entry.status.to_string(),
                    entry
                        .tx_hash
                        .map(|tx| shorten(&tx.0))
                        .unwrap_or_else(|| "-".to_string()),
                    entry.error.unwrap_or_default(),
                ]);
            }

            println!("{}", table);
        }
    }

    Ok(())
}

pub fn print_state(state: &SessionState) {
    let Some(identity) = &state.identity else {
        println!("Not connected.");
        return;
    };

    println!("Account: {}", identity);
    match state.phase {
        Phase::None => {
            println!("Not in a game. {} game(s) open in the lobby.", state.lobby.len());
        }
        Phase::WaitingForOpponent => {
            println!("Game {}: waiting for an opponent", state.active_game_id);
        }
        Phase::InProgress => {
            let symbol = state
                .my_symbol
                .map(|s| s.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("Game {}: you play {}", state.active_game_id, symbol);
            println!();
            print_board(state);
            println!();
            if state.is_my_turn {
                println!("Your turn.");
            } else {
                println!("Opponent's turn.");
            }
            match state.remaining_seconds {
                Some(0) if state.can_claim_win() => {
                    println!("Opponent timed out. Run 'wagertoe claim' to take the stake.")
                }
                Some(0) => println!("Move window has run out."),
                Some(secs) => println!("Time left in this move window: {}s", secs),
                None => println!("Time left: unknown"),
            }
        }
    }
}

pub fn print_board(state: &SessionState) {
    for (row, line) in state.board.rows().iter().enumerate() {
        let base = row * 3;
        println!(
            "  {}      {} {} {}",
            line,
            base,
            base + 1,
            base + 2
        );
    }
}

pub fn print_lobby(state: &SessionState) {
    if state.lobby.is_empty() {
        println!("No open games.");
        println!("Open one with: wagertoe create <stake>");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game", "Stake"]);
    for game in &state.lobby {
        table.add_row(vec![game.id.to_string(), game.stake.to_string()]);
    }
    println!("{}", table);
}

fn print_receipt(receipt: &TxReceipt) {
    println!(
        "Confirmed in block {} (tx {})",
        receipt.block_number,
        shorten(&receipt.tx_hash.0)
    );
}

fn shorten(hash: &str) -> String {
    if hash.len() <= 14 {
        return hash.to_string();
    }
    format!("{}…{}", &hash[..8], &hash[hash.len() - 6..])
}
