use super::game::{print_board, print_lobby, print_state};
use dialoguer::{Input, Select};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use wagertoe_core::{GameClient, GameId, Phase, Result, SessionEvent, WagerError, Wei};

/// Follow the session as the poller updates it, until Ctrl-C.
pub async fn watch(client: &GameClient) -> Result<()> {
    let mut state = client.subscribe();
    let mut events = client.events();

    print_state(&state.borrow_and_update());
    println!();
    println!("Watching for changes (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_state(&state.borrow_and_update());
            }
            event = events.recv() => {
                match event {
                    Ok(event) => announce(&event),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} session events", missed)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Choice {
    Refresh,
    Create,
    Join,
    Leave,
    Move,
    Claim,
    Quit,
}

/// Menu-driven session; the poller keeps the snapshot fresh in between.
pub async fn play(client: &GameClient) -> Result<()> {
    let mut events = client.events();

    loop {
        loop {
            match events.try_recv() {
                Ok(event) => announce(&event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        let state = client.state();
        println!();
        print_state(&state);
        if state.phase == Phase::None {
            print_lobby(&state);
        }

        let mut options = vec![("Refresh", Choice::Refresh)];
        match state.phase {
            Phase::None => {
                options.push(("Create a game", Choice::Create));
                if !state.lobby.is_empty() {
                    options.push(("Join a game", Choice::Join));
                }
            }
            Phase::WaitingForOpponent => options.push(("Leave game", Choice::Leave)),
            Phase::InProgress => {
                if state.can_move() {
                    options.push(("Make a move", Choice::Move));
                }
                if state.can_claim_win() {
                    options.push(("Claim win", Choice::Claim));
                }
            }
        }
        options.push(("Quit", Choice::Quit));

        let labels: Vec<&str> = options.iter().map(|(label, _)| *label).collect();
        let picked = Select::new()
            .with_prompt("What next?")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| WagerError::dialog(e.to_string()))?;

        let outcome = match options[picked].1 {
            Choice::Quit => return Ok(()),
            Choice::Refresh => client.sync_now().await.map(|_| ()),
            Choice::Create => {
                let stake: String = Input::new()
                    .with_prompt("Stake in ETH")
                    .interact_text()
                    .map_err(|e| WagerError::dialog(e.to_string()))?;
                match Wei::parse_ether(&stake) {
                    Ok(stake) => client.create_game(stake).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            Choice::Join => {
                let games: Vec<String> = state
                    .lobby
                    .iter()
                    .map(|g| format!("{}  {}", g.id, g.stake))
                    .collect();
                let index = Select::new()
                    .with_prompt("Join which game?")
                    .items(&games)
                    .default(0)
                    .interact()
                    .map_err(|e| WagerError::dialog(e.to_string()))?;
                let id: GameId = state.lobby[index].id;
                client.join_game(id).await.map(|_| ())
            }
            Choice::Leave => client.leave_game().await.map(|_| ()),
            Choice::Move => {
                print_board(&state);
                let position: u8 = Input::new()
                    .with_prompt("Cell (0-8)")
                    .validate_with(|input: &u8| {
                        if *input <= 8 {
                            Ok(())
                        } else {
                            Err("cells are numbered 0 to 8")
                        }
                    })
                    .interact_text()
                    .map_err(|e| WagerError::dialog(e.to_string()))?;
                client.make_move(position).await.map(|_| ())
            }
            Choice::Claim => client.claim_win().await.map(|_| ()),
        };

        if let Err(e) = outcome {
            println!("{}", e);
        }
    }
}

fn announce(event: &SessionEvent) {
    match event {
        SessionEvent::GameStarted { game_id, symbol } => {
            println!(">> Game {} started. You play {}.", game_id, symbol)
        }
        SessionEvent::GameOver { game_id } => println!(">> Game {} is over.", game_id),
    }
}
