pub mod ai;
pub mod api;
pub mod card;
pub mod controller;
pub mod deck;
pub mod game;
pub mod player;
pub mod session;
pub mod ui;

pub use card::{Card, CardId, CardType, Color};
pub use game::{GameError, GamePhase, GameSettings, GameState, Move};
pub use player::{Player, PlayerId};
pub use session::{GameSession, SessionError, SessionManager};
