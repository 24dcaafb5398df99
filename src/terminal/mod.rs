//! Line-oriented terminal client.
//!
//! Reads moves and commands from stdin, forwards them to a [`Coach`] running
//! against the HTTP backend, and prints the events it emits. Logs go to stderr
//! so they do not interleave with the board.

mod input;
mod render;

pub use input::{Input, parse_input};

use input::HELP;
use render::board;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::coach::{Coach, CoachCommand, CoachEvent};
use crate::config::ClientConfig;
use crate::oracle::HttpOracle;

/// Plays one interactive session until `/quit` or end of input.
#[instrument(skip(config), fields(server_url = %config.server_url()))]
pub async fn run_terminal(config: &ClientConfig) -> anyhow::Result<()> {
    let oracle = Arc::new(HttpOracle::new(config.server_url(), config.request_timeout())?);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<CoachEvent>();
    let (command_tx, command_rx) = mpsc::channel::<CoachCommand>(32);

    let coach = Coach::new(oracle, config.coach_settings(), event_tx);
    let (fen_tx, fen_rx) = watch::channel(coach.session().fen().to_string());

    println!("{}", HELP);
    if let Some(grid) = board(coach.session().fen()) {
        println!("\n{}New game. You play White.", grid);
    }

    let coach_task = tokio::spawn(coach.run(command_rx));

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let CoachEvent::PositionChanged { fen, .. } = &event {
                fen_tx.send_replace(fen.clone());
            }
            if let Some(text) = render::event(&event) {
                println!("{}", text);
            }
        }
        debug!("Event stream closed");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = parse_input(&line);
        match &input {
            Input::Help => println!("{}", HELP),
            Input::Board => match board(&fen_rx.borrow()) {
                Some(grid) => print!("{}", grid),
                None => println!("{}", *fen_rx.borrow()),
            },
            Input::Unknown(text) => println!("? {} (type /help)", text),
            _ => {}
        }

        if let Some(command) = input.command() {
            let quit = matches!(command, CoachCommand::Shutdown);
            if command_tx.send(command).await.is_err() {
                warn!("Coach stopped unexpectedly");
                break;
            }
            if quit {
                break;
            }
        }
    }

    // End of input also stops the controller.
    drop(command_tx);
    let coach = coach_task.await?;
    info!(
        plies = coach.session().history().len(),
        chat_entries = coach.chat_log().len(),
        "Session ended"
    );

    // The printer drains until the coach's event sender is gone.
    drop(coach);
    printer.await?;
    Ok(())
}
