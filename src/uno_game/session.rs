use super::ai;
use super::game::{self, GameError, GameSettings, GameState, Move};
use super::player::Player;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Upper bound on consecutive computer moves resolved after one human move.
const MAX_AI_MOVES: usize = 500;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Game {0} not found")]
    NotFound(String),
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Player {0} is not seated in this game")]
    UnknownPlayer(String),
    #[error("Invalid move: {0}")]
    Rejected(GameError),
    #[error("Failed to create game: {0}")]
    Setup(GameError),
    #[error("Session storage lock poisoned")]
    LockPoisoned,
    #[error("Session worker failed: {0}")]
    Worker(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(_: PoisonError<T>) -> Self {
        SessionError::LockPoisoned
    }
}

/// Game ids are UUIDs; anything else never names a session file.
fn canonical_id(id: &str) -> Result<String, SessionError> {
    let uuid = uuid::Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))?;
    Ok(uuid.hyphenated().to_string())
}

fn session_path(sessions_dir: &Path, id: &str) -> Result<PathBuf, SessionError> {
    Ok(sessions_dir.join(format!("{}.json", canonical_id(id)?)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub id: String,
    pub state: GameState,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl GameSession {
    pub fn new(id: String, state: GameState) -> Self {
        Self {
            id,
            state,
            last_updated: chrono::Utc::now(),
        }
    }

    pub fn save(&self, sessions_dir: &Path) -> Result<(), SessionError> {
        let path = session_path(sessions_dir, &self.id)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(id: &str, sessions_dir: &Path) -> Result<Self, SessionError> {
        let path = session_path(sessions_dir, id)?;
        let json = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SessionError::NotFound(id.to_string()),
            _ => SessionError::Io(e),
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Lets computer seats act until a human is up or the game ends.
    fn run_ai_turns(&mut self) {
        for _ in 0..MAX_AI_MOVES {
            if self.state.is_over() {
                return;
            }
            let seat = self.state.current_player();
            if seat.is_human {
                return;
            }
            let seat_id = seat.id.clone();

            let mv = ai::uno_callout(&self.state, &seat_id)
                .or_else(|| ai::best_move(&self.state, &seat_id));
            let Some(mv) = mv else {
                return;
            };
            let next = match self.state.execute_move(&mv) {
                Cow::Owned(next) => next,
                Cow::Borrowed(_) => return,
            };
            debug!("Game {}: {} played {:?}", self.id, seat_id, mv);
            self.state = next;
        }
    }
}

/// File-backed store of running games.
///
/// Each game has its own lock, so moves for one game are applied strictly one
/// after another while different games never wait on each other.
#[derive(Debug, Clone)]
pub struct SessionManager {
    pub sessions_dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionManager {
    pub fn new(sessions_dir: PathBuf) -> Result<Self, SessionError> {
        fs::create_dir_all(&sessions_dir)?;
        Ok(Self {
            sessions_dir,
            locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Lock for an existing game. Unknown ids fail before an entry is made.
    fn game_lock(&self, id: &str) -> Result<Arc<Mutex<()>>, SessionError> {
        if !session_path(&self.sessions_dir, id)?.is_file() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        let mut locks = self.locks.lock()?;
        Ok(Arc::clone(locks.entry(canonical_id(id)?).or_default()))
    }

    /// Starts a game with one human seat per name, followed by `ai_players`
    /// computer seats.
    pub fn create_session(
        &self,
        player_names: Vec<String>,
        settings: GameSettings,
        ai_players: usize,
    ) -> Result<GameSession, SessionError> {
        let count = player_names.len().checked_add(ai_players).unwrap_or(usize::MAX);
        game::check_player_count(count).map_err(SessionError::Setup)?;

        let mut players: Vec<Player> = player_names
            .into_iter()
            .map(|name| Player::new(uuid::Uuid::new_v4().to_string(), name))
            .collect();
        players.extend(
            (1..=ai_players).map(|n| Player::ai(uuid::Uuid::new_v4().to_string(), format!("Bot {}", n))),
        );

        let state = GameState::new(players, settings).map_err(SessionError::Setup)?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut session = GameSession::new(id, state);
        session.run_ai_turns();
        session.save(&self.sessions_dir)?;
        info!("Created game {}", session.id);
        Ok(session)
    }

    pub fn load_session(&self, id: &str) -> Result<GameSession, SessionError> {
        GameSession::load(id, &self.sessions_dir)
    }

    pub fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.sessions_dir)? {
            let entry = entry?;
            if let Some(file_name) = entry.file_name().to_str() {
                if let Some(id) = file_name.strip_suffix(".json") {
                    sessions.push(id.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    pub fn delete_session(&self, id: &str) -> Result<(), SessionError> {
        let lock = self.game_lock(id)?;
        let _guard = lock.lock()?;
        fs::remove_file(session_path(&self.sessions_dir, id)?).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SessionError::NotFound(id.to_string()),
            _ => SessionError::Io(e),
        })?;
        self.locks.lock()?.remove(&canonical_id(id)?);
        Ok(())
    }

    /// Applies `mv` on behalf of `player_id`, then lets computer seats play.
    ///
    /// Only the current player may move, except for UNO callouts which any
    /// seated player can raise.
    pub fn apply_move(
        &self,
        id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<GameSession, SessionError> {
        let lock = self.game_lock(id)?;
        let _guard = lock.lock()?;

        let mut session = self.load_session(id)?;
        let state = &session.state;

        if state.player(player_id).is_none() {
            return Err(SessionError::UnknownPlayer(player_id.to_string()));
        }
        let is_callout = matches!(mv, Move::ChallengeUno { .. });
        if !is_callout && state.current_player().id != player_id {
            return Err(SessionError::NotYourTurn);
        }

        let next = match state.execute_move(mv) {
            Cow::Owned(next) => next,
            Cow::Borrowed(unchanged) => {
                // Rejected; ask the engine why
                let reason = unchanged
                    .try_move(mv)
                    .err()
                    .unwrap_or(GameError::GameNotInProgress);
                info!("Game {}: rejected move from {}: {}", id, player_id, reason);
                return Err(SessionError::Rejected(reason));
            }
        };

        session.state = next;
        session.run_ai_turns();
        session.last_updated = chrono::Utc::now();
        session.save(&self.sessions_dir)?;
        Ok(session)
    }
}
