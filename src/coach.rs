//! Client-side controller that owns the game and talks to the oracle.
//!
//! [`Coach`] is the single writer of the [`GameSession`]. It runs as one task:
//! commands from the UI and completions of oracle requests arrive on channels
//! and are handled one at a time, so session mutations run one after another.
//! Oracle calls and retry delays run in spawned tasks that report back tagged
//! with the session generation they belong to.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::acquisition::{
    AcquisitionAttempt, AcquisitionState, DEFAULT_CHAT_WINDOW, MoveAcquisitionLoop, ResponseOutcome,
    RetryPolicy,
};
use crate::chat::{ChatEntry, ChatLog, chat_request};
use crate::game::{AnnotationSet, Arrow, GameOutcome, GameSession, HumanMove};
use crate::oracle::{ChatReply, MoveSuggestion, Oracle, OracleError};

/// Requests from the UI.
#[derive(Debug, Clone)]
pub enum CoachCommand {
    /// The pupil dropped a piece.
    HumanMove(HumanMove),
    /// The pupil sent a chat message.
    Chat(String),
    /// The pupil pressed retry after a failure.
    Retry,
    /// Start a new game.
    Reset,
    /// Stop the controller.
    Shutdown,
}

/// Notifications for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum CoachEvent {
    /// The position changed (move applied or reset).
    PositionChanged {
        /// Current FEN.
        fen: String,
        /// Moves so far in SAN.
        history: Vec<String>,
    },
    /// A board move was refused; the piece snaps back.
    HumanMoveRejected {
        /// The refused move.
        candidate: String,
        /// Why.
        reason: String,
    },
    /// The acquisition loop entered a state.
    AcquisitionChanged(AcquisitionState),
    /// Inline status line; `None` clears it.
    StatusChanged(Option<String>),
    /// A chat entry was appended.
    ChatAppended(ChatEntry),
    /// The arrows on the board were replaced.
    AnnotationsChanged(Vec<Arrow>),
    /// The coach named the game.
    TitleChanged(String),
    /// The game ended.
    GameOver(GameOutcome),
}

/// Tunables for the controller.
#[derive(Debug, Clone, Copy)]
pub struct CoachSettings {
    /// Attempt ceiling and backoff for oracle moves.
    pub retry: RetryPolicy,
    /// Chat entries sent with each request.
    pub chat_window: usize,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chat_window: DEFAULT_CHAT_WINDOW,
        }
    }
}

#[derive(Debug)]
enum Completion {
    Move {
        generation: u64,
        attempt_number: u32,
        result: Result<MoveSuggestion, OracleError>,
    },
    RetryDue {
        generation: u64,
    },
    Chat {
        generation: u64,
        result: Result<ChatReply, OracleError>,
    },
}

/// Owns the game, the chat log and the acquisition loop.
pub struct Coach<O: Oracle + 'static> {
    oracle: Arc<O>,
    settings: CoachSettings,
    session: GameSession,
    chat: ChatLog,
    acquisition: MoveAcquisitionLoop,
    annotations: AnnotationSet,
    title: Option<String>,
    events: mpsc::UnboundedSender<CoachEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: Option<mpsc::UnboundedReceiver<Completion>>,
}

impl<O: Oracle + 'static> Coach<O> {
    /// Creates a controller for a fresh game.
    #[instrument(skip(oracle, events))]
    pub fn new(
        oracle: Arc<O>,
        settings: CoachSettings,
        events: mpsc::UnboundedSender<CoachEvent>,
    ) -> Self {
        info!("Creating coach controller");
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            oracle,
            settings,
            session: GameSession::new(),
            chat: ChatLog::new(),
            acquisition: MoveAcquisitionLoop::new(settings.retry, settings.chat_window),
            annotations: AnnotationSet::new(),
            title: None,
            events,
            completions_tx,
            completions_rx: Some(completions_rx),
        }
    }

    /// The game.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// The conversation.
    pub fn chat_log(&self) -> &ChatLog {
        &self.chat
    }

    /// Current acquisition state.
    pub fn acquisition_state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    /// Arrows on the board.
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// Title given to the game by the coach.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Inline status message for the UI.
    pub fn status_message(&self) -> Option<String> {
        self.acquisition.status_message()
    }

    /// Processes commands and oracle completions until shutdown.
    ///
    /// Returns the controller so callers can inspect the final state.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut commands: mpsc::Receiver<CoachCommand>) -> Self {
        let Some(mut completions) = self.completions_rx.take() else {
            warn!("Coach already ran; completion channel is gone");
            return self;
        };
        info!("Coach running");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(CoachCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
            }
        }

        info!("Coach stopped");
        self.completions_rx = Some(completions);
        self
    }

    fn handle_command(&mut self, command: CoachCommand) {
        debug!(command = ?command, "Handling command");
        match command {
            CoachCommand::HumanMove(candidate) => self.on_human_move(candidate),
            CoachCommand::Chat(text) => self.on_chat(text),
            CoachCommand::Retry => self.on_retry(),
            CoachCommand::Reset => self.on_reset(),
            CoachCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Move {
                generation,
                attempt_number,
                result,
            } => self.on_move_response(generation, attempt_number, result),
            Completion::RetryDue { generation } => {
                let resumed = self.acquisition.resume(&self.session, &self.chat, generation);
                if let Some(attempt) = resumed {
                    self.dispatch(attempt);
                }
                self.flush_transitions();
            }
            Completion::Chat { generation, result } => self.on_chat_response(generation, result),
        }
    }

    #[instrument(skip(self, candidate), fields(candidate = %candidate))]
    fn on_human_move(&mut self, candidate: HumanMove) {
        match self.session.apply_human_move(&candidate) {
            Ok(record) => {
                info!(san = %record.san(), "Human move applied");
                self.acquisition.reset();
                self.annotations.clear();
                self.flush_transitions();
                self.emit_position();
                self.emit(CoachEvent::AnnotationsChanged(Vec::new()));
                self.emit(CoachEvent::StatusChanged(None));
                if self.emit_game_over() {
                    return;
                }
                if let Some(attempt) = self.acquisition.begin_turn(&self.session, &self.chat) {
                    self.dispatch(attempt);
                }
                self.flush_transitions();
            }
            Err(e) => {
                self.emit(CoachEvent::HumanMoveRejected {
                    candidate: e.candidate.clone(),
                    reason: format!("{}: {}", e.kind, e.message),
                });
            }
        }
    }

    fn on_move_response(
        &mut self,
        generation: u64,
        attempt_number: u32,
        result: Result<MoveSuggestion, OracleError>,
    ) {
        let outcome = self
            .acquisition
            .handle_response(&mut self.session, generation, attempt_number, result);
        self.flush_transitions();

        match outcome {
            ResponseOutcome::Stale => {}
            ResponseOutcome::Accepted { suggestion, .. } => {
                self.emit_position();
                self.annotations.replace(suggestion.arrows.unwrap_or_default());
                self.emit(CoachEvent::AnnotationsChanged(self.annotations.arrows().to_vec()));
                if !suggestion.comment.trim().is_empty() {
                    self.append_chat(ChatEntry::coach(suggestion.comment.trim()));
                }
                if let Some(title) = suggestion.title.filter(|t| !t.trim().is_empty()) {
                    self.title = Some(title.clone());
                    self.emit(CoachEvent::TitleChanged(title));
                }
                self.emit(CoachEvent::StatusChanged(None));
                self.emit_game_over();
            }
            ResponseOutcome::RetryAfter { delay, failure } => {
                self.emit(CoachEvent::StatusChanged(Some(failure.to_string())));
                self.schedule_retry(generation, delay);
            }
            ResponseOutcome::Failed(failure) => {
                self.emit(CoachEvent::StatusChanged(Some(failure.to_string())));
            }
        }
    }

    fn on_retry(&mut self) {
        if let Some(attempt) = self.acquisition.manual_retry(&self.session, &self.chat) {
            self.emit(CoachEvent::StatusChanged(None));
            self.dispatch(attempt);
        }
        self.flush_transitions();
    }

    fn on_reset(&mut self) {
        self.session.reset();
        self.acquisition.reset();
        self.annotations.clear();
        self.title = None;
        self.flush_transitions();
        self.emit_position();
        self.emit(CoachEvent::AnnotationsChanged(Vec::new()));
        self.emit(CoachEvent::StatusChanged(None));
    }

    #[instrument(skip(self, text), fields(length = text.len()))]
    fn on_chat(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            debug!("Ignoring empty chat message");
            return;
        }
        self.append_chat(ChatEntry::user(text));

        let request = chat_request(&self.chat, &self.session, self.settings.chat_window);
        let generation = self.session.generation();
        let oracle = Arc::clone(&self.oracle);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = oracle.chat(&request).await;
            if tx.send(Completion::Chat { generation, result }).is_err() {
                debug!("Coach gone before chat reply arrived");
            }
        });
    }

    fn on_chat_response(&mut self, generation: u64, result: Result<ChatReply, OracleError>) {
        let reply = match result {
            Ok(reply) if !reply.response.trim().is_empty() => reply,
            Ok(_) => {
                warn!("Coach sent an empty chat reply");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                return;
            }
        };

        self.append_chat(ChatEntry::coach(reply.response.trim()));
        match reply.arrows {
            Some(arrows) if generation == self.session.generation() => {
                self.annotations.replace(arrows);
                self.emit(CoachEvent::AnnotationsChanged(self.annotations.arrows().to_vec()));
            }
            Some(_) => debug!(generation, "Dropping arrows from a previous game"),
            None => {}
        }
    }

    fn dispatch(&self, attempt: AcquisitionAttempt) {
        let generation = *attempt.generation();
        let attempt_number = *attempt.attempt_number();
        debug!(generation, attempt_number, "Dispatching oracle request");

        let oracle = Arc::clone(&self.oracle);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = oracle.suggest_move(attempt.request()).await;
            let completion = Completion::Move {
                generation,
                attempt_number,
                result,
            };
            if tx.send(completion).is_err() {
                debug!("Coach gone before oracle move arrived");
            }
        });
    }

    fn schedule_retry(&self, generation: u64, delay: Duration) {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(Completion::RetryDue { generation }).is_err() {
                debug!("Coach gone before retry fired");
            }
        });
    }

    fn append_chat(&mut self, entry: ChatEntry) {
        self.chat.push(entry.clone());
        self.emit(CoachEvent::ChatAppended(entry));
    }

    fn flush_transitions(&mut self) {
        for state in self.acquisition.take_transitions() {
            self.emit(CoachEvent::AcquisitionChanged(state));
        }
    }

    fn emit_position(&self) {
        self.emit(CoachEvent::PositionChanged {
            fen: self.session.fen().to_string(),
            history: self.session.san_history(),
        });
    }

    fn emit_game_over(&self) -> bool {
        match self.session.outcome() {
            Some(outcome) => {
                info!(outcome = %outcome, "Game over");
                self.emit(CoachEvent::GameOver(outcome));
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: CoachEvent) {
        if self.events.send(event).is_err() {
            debug!("No UI listening for coach events");
        }
    }
}
