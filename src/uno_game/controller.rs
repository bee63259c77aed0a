use super::ai;
use super::game::{self, GameError, GameSettings, GameState, Move};
use super::player::{Player, PlayerId};
use super::ui::{Action, ConsoleUI};
use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::io;

/// Guard against a table where nobody can ever play again.
const MAX_TURNS: usize = 10_000;

/// Drives a console game: human seats are prompted through `ConsoleUI`,
/// computer seats move on their own.
pub struct GameController {
    state: GameState,
    ui: ConsoleUI,
    rng: ChaCha20Rng,
}

impl GameController {
    /// Seats `humans` then `ai_players` computer players. A seed makes the
    /// deal and every later shuffle reproducible.
    pub fn new(
        humans: Vec<String>,
        ai_players: usize,
        settings: GameSettings,
        seed: Option<u64>,
        ui: ConsoleUI,
    ) -> Result<Self, GameError> {
        game::check_player_count(humans.len().checked_add(ai_players).unwrap_or(usize::MAX))?;

        let mut rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_os_rng(),
        };

        let mut players: Vec<Player> = humans
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(format!("p{}", i + 1), name))
            .collect();
        players.extend((1..=ai_players).map(|n| Player::ai(format!("bot{}", n), format!("Bot {}", n))));

        let state = GameState::new_with_rng(players, settings, &mut rng)?;
        Ok(Self { state, ui, rng })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Plays until someone wins. Returns the winner's id, or `None` if the
    /// turn limit was reached first.
    pub fn run(&mut self) -> io::Result<Option<PlayerId>> {
        self.ui.message("Welcome to Uno!")?;

        for _ in 0..MAX_TURNS {
            if let Some(winner) = &self.state.winner_id {
                return Ok(Some(winner.clone()));
            }

            let player = self.state.current_player().clone();
            let mv = if player.is_human {
                match self.prompt_move(&player)? {
                    Some(mv) => mv,
                    None => continue,
                }
            } else {
                match ai::uno_callout(&self.state, &player.id)
                    .or_else(|| ai::best_move(&self.state, &player.id))
                {
                    Some(mv) => mv,
                    None => break,
                }
            };

            match self.state.try_move_with_rng(&mv, &mut self.rng) {
                Ok(next) => {
                    self.ui.report_move(&player.name, &mv, &next)?;
                    self.state = next;
                }
                Err(e) => {
                    debug!("{} tried {:?}: {}", player.name, mv, e);
                    if player.is_human {
                        self.ui.message(&format!("Error: {}. Please try again.", e))?;
                    }
                }
            }
        }

        if self.state.winner_id.is_none() {
            warn!("Stopping after {} turns without a winner", MAX_TURNS);
        }
        Ok(self.state.winner_id.clone())
    }

    /// Asks the current human seat for a move. `None` means the entry was
    /// unusable and the prompt should start over.
    fn prompt_move(&mut self, player: &Player) -> io::Result<Option<Move>> {
        self.ui
            .message(&format!("\n=== {}'s turn ===", player.name))?;
        self.ui.display_game_state(&self.state)?;
        let playable = self.state.playable_cards(&player.id);
        self.ui.display_player_hand(player, &playable)?;

        let mv = match self.ui.get_player_action(&self.state)? {
            Action::Draw => Move::Draw,
            Action::Pass => Move::Pass,
            Action::Challenge => Move::Challenge,
            Action::CallOut => match self.ui.choose_target(&self.state, &player.id)? {
                Some(target) => Move::challenge_uno(target),
                None => {
                    self.ui.message("No such player.")?;
                    return Ok(None);
                }
            },
            Action::Play => {
                let Some(card) = self
                    .ui
                    .get_card_index()?
                    .and_then(|i| player.hand.get(i))
                    .cloned()
                else {
                    self.ui.message("Invalid card index.")?;
                    return Ok(None);
                };
                let chosen_color = if card.is_wild() {
                    Some(self.ui.choose_color()?)
                } else {
                    None
                };
                let called_uno = player.hand.len() == 2 && self.ui.confirm_uno()?;
                Move::Play {
                    card,
                    chosen_color,
                    called_uno,
                }
            }
        };
        Ok(Some(mv))
    }
}
