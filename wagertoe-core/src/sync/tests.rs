use super::*;
use crate::ledger::fake::{addr, stake, FakeLedger, Read};
use crate::types::{Action, Cell, Mark, PendingGame};

fn setup(me: &Address) -> (Arc<FakeLedger>, Reconciler) {
    let ledger = Arc::new(FakeLedger::with_account(me.clone()));
    let reconciler = Reconciler::new(ledger.clone());
    reconciler.set_identity(Some(me.clone()));
    (ledger, reconciler)
}

fn assert_consistent(state: &SessionState) {
    assert_eq!(state.active_game_id.is_some(), state.phase.has_game());
    if state.phase == Phase::InProgress {
        assert!(state.my_symbol.is_some());
    }
    if state.can_claim_win() {
        assert_eq!(state.phase, Phase::InProgress);
        assert!(!state.is_my_turn);
    }
}

/// Game where `me` created and `opponent` joined; `me` (X) moves first.
fn started_game(ledger: &FakeLedger, me: &Address, opponent: &Address) -> GameId {
    ledger
        .act(me, Action::CreateGame { stake: stake() })
        .unwrap();
    let id = GameId(ledger.world().next_id);
    ledger
        .act(opponent, Action::JoinGame { id, stake: stake() })
        .unwrap();
    id
}

#[tokio::test]
async fn disconnected_pass_is_noop() {
    let ledger = Arc::new(FakeLedger::new());
    let reconciler = Reconciler::new(ledger.clone());

    assert_eq!(reconciler.reconcile().await, PassOutcome::Disconnected);
    assert!(ledger.world().reads.is_empty());
}

#[tokio::test]
async fn lobby_populated_without_game() {
    let me = addr(1);
    let other = addr(2);
    let (ledger, reconciler) = setup(&me);
    ledger
        .act(&other, Action::CreateGame { stake: stake() })
        .unwrap();

    let outcome = reconciler.reconcile().await;
    assert_eq!(outcome, PassOutcome::Applied { changed: true });

    let state = reconciler.snapshot();
    assert_eq!(state.phase, Phase::None);
    assert!(state.active_game_id.is_none());
    assert_eq!(
        state.lobby,
        vec![PendingGame {
            id: GameId(1),
            stake: stake()
        }]
    );
    assert_consistent(&state);
}

#[tokio::test]
async fn created_game_waits_for_opponent() {
    let me = addr(1);
    let (ledger, reconciler) = setup(&me);
    reconciler.reconcile().await;

    ledger
        .act(&me, Action::CreateGame { stake: stake() })
        .unwrap();
    reconciler.reconcile().await;

    let state = reconciler.snapshot();
    assert_eq!(state.active_game_id, GameId(1));
    assert_eq!(state.phase, Phase::WaitingForOpponent);
    assert!(state.my_symbol.is_none());
    assert!(!state.can_claim_win());
    assert_consistent(&state);
}

#[tokio::test]
async fn opponent_joining_starts_game() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    let mut events = reconciler.events();

    ledger
        .act(&me, Action::CreateGame { stake: stake() })
        .unwrap();
    reconciler.reconcile().await;
    assert_eq!(reconciler.snapshot().phase, Phase::WaitingForOpponent);

    ledger
        .act(
            &opponent,
            Action::JoinGame {
                id: GameId(1),
                stake: stake(),
            },
        )
        .unwrap();
    ledger.set_timeout(Some(60));
    reconciler.reconcile().await;

    let state = reconciler.snapshot();
    assert_eq!(state.phase, Phase::InProgress);
    assert_eq!(state.my_symbol, Some(Mark::X));
    assert!(state.is_my_turn);
    assert_eq!(state.remaining_seconds, Some(60));
    assert_eq!(state.board, Board::empty());
    assert_consistent(&state);

    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::GameStarted {
            game_id: GameId(1),
            symbol: Mark::X
        }
    );
}

#[tokio::test]
async fn symbol_match_ignores_address_case() {
    let me = Address::parse("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
    let me_upper = Address::parse("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);

    // ledger stores the checksummed spelling
    started_game(&ledger, &me_upper, &opponent);
    reconciler.reconcile().await;

    let state = reconciler.snapshot();
    assert_eq!(state.my_symbol, Some(Mark::X));
    assert!(state.is_my_turn);
}

#[tokio::test]
async fn symbol_fixed_for_game_lifetime() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    let mut events = reconciler.events();

    let id = started_game(&ledger, &opponent, &me);
    ledger.set_timeout(Some(30));
    reconciler.reconcile().await;
    assert_eq!(reconciler.snapshot().my_symbol, Some(Mark::O));

    ledger.act(&opponent, Action::MakeMove { position: 0 }).unwrap();
    reconciler.reconcile().await;
    ledger.act(&me, Action::MakeMove { position: 4 }).unwrap();
    reconciler.reconcile().await;

    let state = reconciler.snapshot();
    assert_eq!(state.active_game_id, id);
    assert_eq!(state.my_symbol, Some(Mark::O));
    assert_eq!(state.board.0[0], Cell::X);
    assert_eq!(state.board.0[4], Cell::O);

    let mut started = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::GameStarted { .. }) {
            started += 1;
        }
    }
    assert_eq!(started, 1);
}

#[tokio::test]
async fn repeated_pass_is_idempotent() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    started_game(&ledger, &me, &opponent);
    ledger.act(&me, Action::MakeMove { position: 2 }).unwrap();
    ledger.set_timeout(Some(42));

    reconciler.reconcile().await;
    let first = reconciler.snapshot();
    let first_json = serde_json::to_vec(&first).unwrap();

    let mut rx = reconciler.subscribe();
    rx.borrow_and_update();
    let outcome = reconciler.reconcile().await;
    let second = reconciler.snapshot();

    assert_eq!(outcome, PassOutcome::Applied { changed: false });
    assert_eq!(first, second);
    assert_eq!(first_json, serde_json::to_vec(&second).unwrap());
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn claim_enabled_only_on_zero_timeout() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    started_game(&ledger, &me, &opponent);
    ledger.act(&me, Action::MakeMove { position: 0 }).unwrap();

    ledger.set_timeout(Some(15));
    reconciler.reconcile().await;
    let state = reconciler.snapshot();
    assert!(!state.is_my_turn);
    assert!(!state.can_claim_win());

    ledger.set_timeout(Some(0));
    reconciler.reconcile().await;
    assert!(reconciler.snapshot().can_claim_win());
    assert_consistent(&reconciler.snapshot());

    // a failed timeout read must not leave a stale claim enabled
    ledger.fail(Read::Timeout);
    reconciler.reconcile().await;
    let state = reconciler.snapshot();
    assert_eq!(state.remaining_seconds, None);
    assert!(!state.can_claim_win());
}

#[tokio::test]
async fn zero_timeout_on_own_turn_is_not_claimable() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    started_game(&ledger, &me, &opponent);
    ledger.set_timeout(Some(0));

    reconciler.reconcile().await;
    let state = reconciler.snapshot();
    assert!(state.is_my_turn);
    assert!(!state.can_claim_win());
}

#[tokio::test]
async fn remote_game_end_emits_game_over_once() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    let mut events = reconciler.events();
    let id = started_game(&ledger, &me, &opponent);
    ledger.set_timeout(Some(30));

    reconciler.reconcile().await;
    // opponent wins by claiming after our timeout
    ledger.act(&me, Action::MakeMove { position: 0 }).unwrap();
    ledger.world().end_game(id.0);

    reconciler.reconcile().await;
    let state = reconciler.snapshot();
    assert!(state.is_lobby_shape());
    assert_eq!(state.identity, Some(me.clone()));
    assert_consistent(&state);

    reconciler.reconcile().await;

    let game_overs: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, SessionEvent::GameOver { .. }))
        .collect();
    assert_eq!(game_overs, vec![SessionEvent::GameOver { game_id: id }]);
}

#[tokio::test]
async fn failed_board_read_keeps_previous_board() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    started_game(&ledger, &me, &opponent);
    ledger.set_timeout(Some(30));
    ledger.act(&me, Action::MakeMove { position: 0 }).unwrap();

    reconciler.reconcile().await;
    let before = reconciler.snapshot();
    assert_eq!(before.board.0[0], Cell::X);
    assert!(!before.is_my_turn);

    ledger.fail(Read::Board);
    ledger.act(&opponent, Action::MakeMove { position: 8 }).unwrap();
    ledger.set_timeout(Some(25));
    reconciler.reconcile().await;

    let after = reconciler.snapshot();
    assert_eq!(after.board, before.board);
    assert!(after.is_my_turn);
    assert_eq!(after.remaining_seconds, Some(25));
    assert_eq!(after.my_symbol, before.my_symbol);
    assert_eq!(after.lobby, before.lobby);

    ledger.heal(Read::Board);
    reconciler.reconcile().await;
    assert_eq!(reconciler.snapshot().board.0[8], Cell::O);
}

#[tokio::test]
async fn failed_game_id_read_leaves_state_untouched() {
    let me = addr(1);
    let opponent = addr(2);
    let (ledger, reconciler) = setup(&me);
    started_game(&ledger, &me, &opponent);
    ledger.set_timeout(Some(30));
    reconciler.reconcile().await;
    let before = reconciler.snapshot();

    ledger.fail(Read::PlayerGame);
    assert_eq!(reconciler.reconcile().await, PassOutcome::Failed);
    assert_eq!(reconciler.snapshot(), before);

    ledger.heal(Read::PlayerGame);
    ledger.fail(Read::Game);
    assert_eq!(reconciler.reconcile().await, PassOutcome::Failed);
    assert_eq!(reconciler.snapshot(), before);
}

#[tokio::test]
async fn failed_lobby_read_keeps_previous_listing() {
    let me = addr(1);
    let other = addr(3);
    let (ledger, reconciler) = setup(&me);
    ledger
        .act(&other, Action::CreateGame { stake: stake() })
        .unwrap();
    reconciler.reconcile().await;
    assert_eq!(reconciler.snapshot().lobby.len(), 1);

    ledger.fail(Read::PendingGames);
    reconciler.reconcile().await;
    assert_eq!(reconciler.snapshot().lobby.len(), 1);
}

#[tokio::test]
async fn identity_change_discards_in_flight_result() {
    let me = addr(1);
    let other = addr(2);
    let (_ledger, reconciler) = setup(&me);

    let epoch = reconciler.epoch.load(Ordering::SeqCst);
    let prev = reconciler.snapshot();
    let derived = reconciler.derive(&prev, &me).await.unwrap();

    reconciler.set_identity(Some(other.clone()));
    assert_eq!(reconciler.publish(epoch, &me, derived), PassOutcome::Stale);
    assert_eq!(reconciler.snapshot(), SessionState::connected(other));
}

#[tokio::test]
async fn timer_pass_skipped_while_another_runs() {
    let me = addr(1);
    let (_ledger, reconciler) = setup(&me);

    let guard = reconciler.pass_guard.lock().await;
    assert_eq!(reconciler.poll().await, PassOutcome::Skipped);
    drop(guard);
    assert!(matches!(reconciler.poll().await, PassOutcome::Applied { .. }));
}

#[tokio::test]
async fn reset_and_reconcile_skips_game_over() {
    let me = addr(1);
    let (ledger, reconciler) = setup(&me);
    let mut events = reconciler.events();
    ledger
        .act(&me, Action::CreateGame { stake: stake() })
        .unwrap();
    reconciler.reconcile().await;

    ledger.act(&me, Action::LeavePendingGame).unwrap();
    reconciler.reset_and_reconcile().await;

    let state = reconciler.snapshot();
    assert!(state.is_lobby_shape());
    assert!(state.lobby.is_empty());
    assert!(events.try_recv().is_err());
}
