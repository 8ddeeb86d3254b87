//! Local self-play matches.

use crate::config::GamesConfig;
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::time::Duration;
use strictly_session::{
    EventKind, EventOf, GameSession, PlayerId, SessionDirectory, SessionErrorKind,
};
use strictly_tictactoe::{Move, TicTacToe, TicTacToeFactory};
use strum::IntoEnumIterator;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, instrument, warn};

/// Plays `games` matches with both sides picking random free squares.
#[instrument(skip(config))]
pub async fn run(config: GamesConfig, games: usize, think_ms: u64) -> Result<()> {
    let directory = SessionDirectory::new(TicTacToeFactory, config.engine().clone())?;
    let think = Duration::from_millis(think_ms);

    for round in 1..=games {
        let id = directory.create(config.tictactoe().clone())?;
        let session = directory
            .lookup(&id)?
            .with_context(|| format!("session {id} vanished after create"))?;
        info!(round, session_id = %id, "Starting self-play match");
        play_match(&session, think).await?;
    }

    for summary in directory.summaries()? {
        println!("{}", serde_json::to_string(&summary)?);
    }
    let pruned = directory.prune_finished()?;
    info!(pruned, "Demo complete");
    Ok(())
}

async fn play_match(session: &GameSession<TicTacToe>, think: Duration) -> Result<()> {
    let all_kinds: Vec<EventKind> = EventKind::iter().collect();
    let mut events = session.events(&all_kinds)?;

    let x = session.register_new_player(None)?;
    let o = session.register_new_player(None)?;
    for registration in [&x, &o] {
        let player = session.resolve_token(&registration.token)?;
        session.connect(player)?;
    }
    print_events(&mut events)?;

    while let Some(player) = session.next_player()? {
        if !think.is_zero() {
            tokio::time::sleep(think).await;
        }
        let board = session.full_state()?.board;
        let position = *board
            .empty_positions()
            .choose(&mut rand::thread_rng())
            .context("no free square on a running board")?;
        match session.make_move(player, Move::new(position)) {
            Ok(()) => {}
            // The clock moved the turn while we were thinking.
            Err(e) if matches!(
                e.kind(),
                SessionErrorKind::IllegalMove | SessionErrorKind::GameNotStarted
            ) =>
            {
                warn!(%player, error = %e, "Move overtaken by the clock");
            }
            Err(e) => return Err(e.into()),
        }
        print_events(&mut events)?;
    }

    let state = session.full_state()?;
    println!("{}", state.board.display());
    for viewer in [Some(x.player), Some(o.player), None::<PlayerId>] {
        let replay = session.replay(viewer)?;
        let label = viewer.map_or_else(|| "spectator".to_string(), |p| format!("player {p}"));
        println!("replay for {label}: {}", serde_json::to_string(&replay)?);
    }
    println!("{}", serde_json::to_string_pretty(&session.summary()?)?);
    Ok(())
}

fn print_events(events: &mut UnboundedReceiver<EventOf<TicTacToe>>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
