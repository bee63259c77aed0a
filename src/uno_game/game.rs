use super::card::{Card, CardId, CardType, Color};
use super::deck;
use super::player::{Player, PlayerId};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

pub const INITIAL_HAND_SIZE: usize = 7;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 14;

/// Cards drawn by a player caught holding one card without calling UNO.
const UNO_PENALTY: usize = 2;
/// Extra cards drawn by a challenger who loses a Wild Draw Four challenge.
const CHALLENGE_PENALTY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Normal,
    /// The current player drew a playable card and must play it or pass.
    AfterDraw,
}

/// Represents the direction of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn reverse(&self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub allow_stacking: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            allow_stacking: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("UNO needs 2 to 14 players, got {count}")]
    InvalidPlayerCount { count: usize },
    #[error("Deck is empty")]
    EmptyDeck,
    #[error("Game is not in progress")]
    GameNotInProgress,
    #[error("Card {0} is not in the current player's hand")]
    CardNotInHand(CardId),
    #[error("Card {0} cannot be played now")]
    IllegalCard(CardId),
    #[error("Can only pass right after drawing a playable card")]
    NotAfterDraw,
    #[error("Must play the drawn card or pass")]
    DrawnCardPending,
    #[error("There is no Wild Draw Four to challenge")]
    NoChallengeAvailable,
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Move {
    Play {
        card: Card,
        #[serde(default)]
        chosen_color: Option<Color>,
        #[serde(default)]
        called_uno: bool,
    },
    Draw,
    Pass,
    Challenge,
    ChallengeUno {
        target_player_id: PlayerId,
    },
}

impl Move {
    pub fn play(card: Card) -> Self {
        Move::Play {
            card,
            chosen_color: None,
            called_uno: false,
        }
    }

    pub fn play_wild(card: Card, color: Color) -> Self {
        Move::Play {
            card,
            chosen_color: Some(color),
            called_uno: false,
        }
    }

    pub fn challenge_uno(target: impl Into<PlayerId>) -> Self {
        Move::ChallengeUno {
            target_player_id: target.into(),
        }
    }
}

/// The whole game. Every transition produces a new value; nothing here is
/// mutated through a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Player>,
    pub current_player_index: usize,
    pub direction: Direction,
    pub draw_pile: Vec<Card>,
    pub discard_pile: Vec<Card>,
    /// Color the next play must match; differs from the top card's color after a wild.
    pub current_color: Color,
    /// Color in effect before the last Wild Draw Four, kept for challenges.
    pub previous_color: Option<Color>,
    /// Mirrors the last card of `discard_pile`.
    pub current_card: Card,
    pub pending_draw_count: usize,
    pub game_phase: GamePhase,
    pub winner_id: Option<PlayerId>,
    pub turn_phase: TurnPhase,
    pub drawn_card: Option<Card>,
    pub settings: GameSettings,
}

/// Rejects a table size outside `MIN_PLAYERS..=MAX_PLAYERS`.
pub fn check_player_count(count: usize) -> Result<(), GameError> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
        Ok(())
    } else {
        Err(GameError::InvalidPlayerCount { count })
    }
}

impl GameState {
    pub fn new(players: Vec<Player>, settings: GameSettings) -> Result<Self, GameError> {
        Self::new_with_rng(players, settings, &mut rand::rng())
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        mut players: Vec<Player>,
        settings: GameSettings,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        check_player_count(players.len())?;

        let mut draw_pile = deck::full_deck();
        deck::shuffle(&mut draw_pile, rng);

        for player in players.iter_mut() {
            player.hand.clear();
            player.has_called_uno = false;
        }

        // Deal 7 cards, one at a time around the table
        for _ in 0..INITIAL_HAND_SIZE {
            for player in players.iter_mut() {
                let card = draw_pile.pop().ok_or(GameError::EmptyDeck)?;
                player.add_card(card);
            }
        }

        // Wilds never start the discard pile; they go back in and the pile is reshuffled
        let start_card = loop {
            let card = draw_pile.pop().ok_or(GameError::EmptyDeck)?;
            if !card.is_wild() {
                break card;
            }
            draw_pile.push(card);
            deck::shuffle(&mut draw_pile, rng);
        };

        let mut state = Self {
            players,
            current_player_index: 0,
            direction: Direction::Clockwise,
            draw_pile,
            discard_pile: vec![start_card.clone()],
            current_color: start_card.color,
            previous_color: None,
            current_card: start_card,
            pending_draw_count: 0,
            game_phase: GamePhase::Playing,
            winner_id: None,
            turn_phase: TurnPhase::Normal,
            drawn_card: None,
            settings,
        };
        state.apply_start_card(rng);

        info!(
            "New game: {} players, start card {}, {} to act",
            state.players.len(),
            state.current_card,
            state.current_player().name
        );
        Ok(state)
    }

    /// Resolves the effect of the first discard before anyone acts.
    fn apply_start_card<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.current_card.card_type {
            CardType::DrawTwo => {
                let cards = self.draw_cards(2, rng);
                self.deal_to(0, cards);
                self.current_player_index = 1;
            }
            CardType::Reverse if self.players.len() == 2 => self.current_player_index = 1,
            CardType::Reverse => self.direction = Direction::CounterClockwise,
            CardType::Skip => self.current_player_index = 1,
            _ => {}
        }
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player_index]
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn is_over(&self) -> bool {
        self.game_phase == GamePhase::GameOver
    }

    /// Cards across both piles and every hand; 108 for any reachable state.
    pub fn total_cards(&self) -> usize {
        self.draw_pile.len()
            + self.discard_pile.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// Cards in the given player's hand that `is_valid_move` accepts right now.
    pub fn playable_cards(&self, player_id: &str) -> Vec<&Card> {
        self.player(player_id)
            .map(|p| p.hand.iter().filter(|c| self.is_valid_move(c)).collect())
            .unwrap_or_default()
    }

    pub fn next_player_index(&self, from: usize) -> usize {
        let num_players = self.players.len();
        match self.direction {
            Direction::Clockwise => (from + 1) % num_players,
            Direction::CounterClockwise => (from + num_players - 1) % num_players,
        }
    }

    pub fn previous_player_index(&self, from: usize) -> usize {
        let num_players = self.players.len();
        match self.direction {
            Direction::Clockwise => (from + num_players - 1) % num_players,
            Direction::CounterClockwise => (from + 1) % num_players,
        }
    }

    /// Checks whether `card` may be played on the current state.
    pub fn is_valid_move(&self, card: &Card) -> bool {
        if self.game_phase != GamePhase::Playing {
            return false;
        }

        if self.pending_draw_count > 0 {
            // Stacking is same kind only: +2 on +2, +4 on +4
            return self.settings.allow_stacking
                && matches!(card.card_type, CardType::DrawTwo | CardType::WildDrawFour)
                && card.card_type == self.current_card.card_type;
        }

        if self.turn_phase == TurnPhase::AfterDraw {
            return self
                .drawn_card
                .as_ref()
                .is_some_and(|drawn| drawn.id == card.id);
        }

        if card.is_wild() || card.color == self.current_color {
            return true;
        }

        match (card.card_type, self.current_card.card_type) {
            (CardType::Number(played), CardType::Number(top)) => played == top,
            (CardType::Number(_), _) => false,
            (played, top) => played.same_kind(&top),
        }
    }

    /// Applies `mv` and returns the next state.
    ///
    /// A rejected move comes back as `Cow::Borrowed(self)`: the very state
    /// that was passed in. Accepted moves always come back `Owned`, even when
    /// they change nothing (an unfounded UNO callout).
    pub fn execute_move(&self, mv: &Move) -> Cow<'_, GameState> {
        self.execute_move_with_rng(mv, &mut rand::rng())
    }

    pub fn execute_move_with_rng<R: Rng + ?Sized>(
        &self,
        mv: &Move,
        rng: &mut R,
    ) -> Cow<'_, GameState> {
        match self.try_move_with_rng(mv, rng) {
            Ok(next) => Cow::Owned(next),
            Err(reason) => {
                debug!("Rejected {:?}: {}", mv, reason);
                Cow::Borrowed(self)
            }
        }
    }

    /// Like `execute_move`, but a rejection carries its reason.
    pub fn try_move(&self, mv: &Move) -> Result<GameState, GameError> {
        self.try_move_with_rng(mv, &mut rand::rng())
    }

    pub fn try_move_with_rng<R: Rng + ?Sized>(
        &self,
        mv: &Move,
        rng: &mut R,
    ) -> Result<GameState, GameError> {
        if self.game_phase != GamePhase::Playing {
            return Err(GameError::GameNotInProgress);
        }

        let mut next = self.clone();
        match mv {
            Move::Pass => next.pass()?,
            Move::Draw => next.draw(rng)?,
            Move::Challenge => next.challenge(rng)?,
            Move::ChallengeUno { target_player_id } => next.challenge_uno(target_player_id, rng)?,
            Move::Play {
                card,
                chosen_color,
                called_uno,
            } => next.play(&card.id, *chosen_color, *called_uno)?,
        }
        Ok(next)
    }

    fn pass(&mut self) -> Result<(), GameError> {
        if self.turn_phase != TurnPhase::AfterDraw {
            return Err(GameError::NotAfterDraw);
        }
        self.turn_phase = TurnPhase::Normal;
        self.drawn_card = None;
        self.advance_turn();
        Ok(())
    }

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GameError> {
        if self.turn_phase == TurnPhase::AfterDraw {
            return Err(GameError::DrawnCardPending);
        }

        let index = self.current_player_index;

        // Absorbing a penalty ends the turn
        if self.pending_draw_count > 0 {
            let amount = self.pending_draw_count;
            let cards = self.draw_cards(amount, rng);
            self.deal_to(index, cards);
            self.pending_draw_count = 0;
            self.advance_turn();
            return Ok(());
        }

        match self.draw_cards(1, rng).pop() {
            Some(card) => {
                let playable = self.is_valid_move(&card);
                self.deal_to(index, vec![card.clone()]);
                if playable {
                    self.turn_phase = TurnPhase::AfterDraw;
                    self.drawn_card = Some(card);
                } else {
                    self.advance_turn();
                }
            }
            None => self.advance_turn(),
        }
        Ok(())
    }

    fn challenge<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GameError> {
        if self.pending_draw_count < 4 || self.current_card.card_type != CardType::WildDrawFour {
            return Err(GameError::NoChallengeAvailable);
        }

        let challenger = self.current_player_index;
        let challenged = self.previous_player_index(challenger);
        let color = self.previous_color.unwrap_or(Color::Red);
        let guilty = self.players[challenged]
            .hand
            .iter()
            .any(|c| c.color == color);
        let pending = self.pending_draw_count;
        self.pending_draw_count = 0;

        if guilty {
            // Full pending amount, which may be a stack; the challenger keeps the turn
            info!(
                "Challenge upheld: {} held {} and draws {}",
                self.players[challenged].name, color, pending
            );
            let cards = self.draw_cards(pending, rng);
            self.deal_to(challenged, cards);
        } else {
            info!(
                "Challenge failed: {} draws {}",
                self.players[challenger].name,
                pending + CHALLENGE_PENALTY
            );
            let cards = self.draw_cards(pending + CHALLENGE_PENALTY, rng);
            self.deal_to(challenger, cards);
            self.advance_turn();
        }
        Ok(())
    }

    fn challenge_uno<R: Rng + ?Sized>(
        &mut self,
        target_player_id: &str,
        rng: &mut R,
    ) -> Result<(), GameError> {
        let index = self
            .player_index(target_player_id)
            .ok_or_else(|| GameError::UnknownPlayer(target_player_id.to_string()))?;

        let target = &self.players[index];
        if target.hand.len() == 1 && !target.has_called_uno {
            info!("{} did not call UNO and draws {}", target.name, UNO_PENALTY);
            let cards = self.draw_cards(UNO_PENALTY, rng);
            self.deal_to(index, cards);
            self.players[index].has_called_uno = false;
        }
        Ok(())
    }

    fn play(
        &mut self,
        card_id: &CardId,
        chosen_color: Option<Color>,
        called_uno: bool,
    ) -> Result<(), GameError> {
        let index = self.current_player_index;

        // Validate the hand's copy, not whatever the move claims the card is
        let card = self.players[index]
            .find_card(card_id)
            .cloned()
            .ok_or_else(|| GameError::CardNotInHand(card_id.clone()))?;
        if !self.is_valid_move(&card) {
            return Err(GameError::IllegalCard(card_id.clone()));
        }

        self.players[index].remove_card(card_id);
        self.turn_phase = TurnPhase::Normal;
        self.drawn_card = None;

        self.previous_color = match card.card_type {
            CardType::WildDrawFour => Some(self.current_color),
            _ => None,
        };
        self.current_color = if card.is_wild() {
            // Red when no playable color was named
            chosen_color
                .filter(|c| *c != Color::Wild)
                .unwrap_or(Color::Red)
        } else {
            card.color
        };

        let mut skip_next = false;
        match card.card_type {
            CardType::Skip => skip_next = true,
            // Reversing between two players hands the turn straight back
            CardType::Reverse if self.players.len() == 2 => skip_next = true,
            CardType::Reverse => self.direction = self.direction.reverse(),
            CardType::DrawTwo => self.pending_draw_count += 2,
            CardType::WildDrawFour => self.pending_draw_count += 4,
            CardType::Number(_) | CardType::Wild => {}
        }

        self.discard_pile.push(card.clone());
        self.current_card = card;

        let player = &mut self.players[index];
        if called_uno {
            player.has_called_uno = true;
        }
        if player.hand.len() != 1 {
            player.has_called_uno = false;
        }

        if let Some(winner) = player.has_won().then(|| player.id.clone()) {
            info!("{} wins", player.name);
            self.game_phase = GamePhase::GameOver;
            self.winner_id = Some(winner);
            return Ok(());
        }

        self.advance_turn();
        if skip_next {
            self.advance_turn();
        }
        Ok(())
    }

    fn advance_turn(&mut self) {
        self.current_player_index = self.next_player_index(self.current_player_index);
    }

    fn draw_cards<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<Card> {
        deck::draw_cards(&mut self.draw_pile, &mut self.discard_pile, count, rng)
    }

    /// Adds drawn cards to a hand. A grown hand voids any earlier UNO call.
    fn deal_to(&mut self, index: usize, cards: Vec<Card>) {
        let player = &mut self.players[index];
        player.hand.extend(cards);
        if player.hand.len() != 1 {
            player.has_called_uno = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uno_game::deck::DECK_SIZE;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn card(id: &str, color: Color, card_type: CardType) -> Card {
        Card::with_id(id, color, card_type)
    }

    fn new_game(ids: &[&str], seed: u64) -> GameState {
        let players = ids
            .iter()
            .map(|id| Player::new(*id, format!("Player {}", id)))
            .collect();
        GameState::new_with_rng(
            players,
            GameSettings::default(),
            &mut ChaCha20Rng::seed_from_u64(seed),
        )
        .unwrap()
    }

    /// A hand-built state: `top` on the discard pile, empty hands, and a
    /// draw pile of blue 7s.
    fn fixture(player_count: usize, top: Card) -> GameState {
        GameState {
            players: (0..player_count)
                .map(|i| Player::new(format!("p{}", i), format!("Player {}", i)))
                .collect(),
            current_player_index: 0,
            direction: Direction::Clockwise,
            draw_pile: (0..20)
                .map(|i| card(&format!("draw{}", i), Color::Blue, CardType::Number(7)))
                .collect(),
            discard_pile: vec![top.clone()],
            current_color: top.color,
            previous_color: None,
            current_card: top,
            pending_draw_count: 0,
            game_phase: GamePhase::Playing,
            winner_id: None,
            turn_phase: TurnPhase::Normal,
            drawn_card: None,
            settings: GameSettings::default(),
        }
    }

    fn green_five() -> Card {
        card("top", Color::Green, CardType::Number(5))
    }

    fn filler(id: &str) -> Card {
        card(id, Color::Yellow, CardType::Number(0))
    }

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(99)
    }

    fn accept(state: &GameState, mv: Move) -> GameState {
        match state.execute_move_with_rng(&mv, &mut rng()) {
            Cow::Owned(next) => next,
            Cow::Borrowed(_) => panic!("move {:?} was rejected", mv),
        }
    }

    #[test]
    fn test_new_game() {
        let game = new_game(&["alice", "bob"], 1);

        assert_eq!(game.players.len(), 2);
        assert_eq!(game.discard_pile.len(), 1);
        assert_eq!(game.discard_pile.last(), Some(&game.current_card));
        assert!(!game.current_card.is_wild());
        assert_eq!(game.current_color, game.current_card.color);
        assert_eq!(game.game_phase, GamePhase::Playing);
        assert_eq!(game.turn_phase, TurnPhase::Normal);
        assert_eq!(game.pending_draw_count, 0);
        assert!(game.drawn_card.is_none());
        assert_eq!(game.total_cards(), DECK_SIZE);

        let extra = usize::from(game.current_card.card_type == CardType::DrawTwo) * 2;
        assert_eq!(game.players[0].hand.len(), INITIAL_HAND_SIZE + extra);
        assert_eq!(game.players[1].hand.len(), INITIAL_HAND_SIZE);
    }

    #[test]
    fn test_new_game_is_reproducible_from_seed() {
        let a = new_game(&["a", "b", "c"], 5);
        let b = new_game(&["a", "b", "c"], 5);
        let hand = |g: &GameState| {
            g.players[0]
                .hand
                .iter()
                .map(|c| (c.color, c.card_type))
                .collect::<Vec<_>>()
        };
        assert_eq!(hand(&a), hand(&b));
        assert_eq!(a.current_card.card_type, b.current_card.card_type);
    }

    #[test]
    fn test_invalid_player_count() {
        let one = vec![Player::new("solo", "Solo")];
        assert_eq!(
            GameState::new(one, GameSettings::default()).unwrap_err(),
            GameError::InvalidPlayerCount { count: 1 }
        );

        let crowd = (0..15).map(|i| Player::new(i.to_string(), "x")).collect();
        assert!(matches!(
            GameState::new(crowd, GameSettings::default()),
            Err(GameError::InvalidPlayerCount { count: 15 })
        ));
    }

    #[test]
    fn test_full_table_of_fourteen() {
        for seed in 0..20 {
            let ids: Vec<String> = (0..MAX_PLAYERS).map(|i| format!("p{}", i)).collect();
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let game = new_game(&ids, seed);

            assert_eq!(game.players.len(), 14);
            assert!(!game.current_card.is_wild());
            assert_eq!(game.total_cards(), DECK_SIZE);
        }
    }

    #[test]
    fn test_start_card_draw_two() {
        let mut game = fixture(3, card("start", Color::Red, CardType::DrawTwo));
        game.apply_start_card(&mut rng());

        assert_eq!(game.players[0].hand.len(), 2);
        assert_eq!(game.current_player_index, 1);
        assert_eq!(game.pending_draw_count, 0);
    }

    #[test]
    fn test_start_card_reverse() {
        let mut two = fixture(2, card("start", Color::Red, CardType::Reverse));
        two.apply_start_card(&mut rng());
        assert_eq!(two.current_player_index, 1);
        assert_eq!(two.direction, Direction::Clockwise);

        let mut three = fixture(3, card("start", Color::Red, CardType::Reverse));
        three.apply_start_card(&mut rng());
        assert_eq!(three.current_player_index, 0);
        assert_eq!(three.direction, Direction::CounterClockwise);
    }

    #[test]
    fn test_start_card_skip() {
        let mut game = fixture(4, card("start", Color::Blue, CardType::Skip));
        game.apply_start_card(&mut rng());
        assert_eq!(game.current_player_index, 1);
    }

    #[test]
    fn test_is_valid_move_matching() {
        let game = fixture(2, green_five());

        assert!(game.is_valid_move(&card("1", Color::Green, CardType::Number(1))));
        assert!(game.is_valid_move(&card("2", Color::Red, CardType::Number(5))));
        assert!(game.is_valid_move(&card("3", Color::Wild, CardType::Wild)));
        assert!(game.is_valid_move(&card("4", Color::Wild, CardType::WildDrawFour)));
        assert!(!game.is_valid_move(&card("5", Color::Red, CardType::Number(1))));
        assert!(!game.is_valid_move(&card("6", Color::Red, CardType::Skip)));
    }

    #[test]
    fn test_is_valid_move_symbol_match_across_colors() {
        let game = fixture(2, card("top", Color::Blue, CardType::Skip));

        assert!(game.is_valid_move(&card("1", Color::Red, CardType::Skip)));
        assert!(!game.is_valid_move(&card("2", Color::Red, CardType::Reverse)));
        assert!(!game.is_valid_move(&card("3", Color::Red, CardType::Number(5))));
    }

    #[test]
    fn test_is_valid_move_follows_declared_color() {
        let mut game = fixture(2, card("top", Color::Wild, CardType::Wild));
        game.current_color = Color::Yellow;

        assert!(game.is_valid_move(&card("1", Color::Yellow, CardType::Number(2))));
        assert!(!game.is_valid_move(&card("2", Color::Red, CardType::Number(2))));
    }

    #[test]
    fn test_nothing_is_valid_after_game_over() {
        let mut game = fixture(2, green_five());
        game.game_phase = GamePhase::GameOver;
        assert!(!game.is_valid_move(&card("w", Color::Wild, CardType::Wild)));
    }

    #[test]
    fn test_stacking_is_same_kind_only() {
        let mut game = fixture(2, card("top", Color::Blue, CardType::DrawTwo));
        game.pending_draw_count = 2;

        assert!(game.is_valid_move(&card("1", Color::Red, CardType::DrawTwo)));
        assert!(!game.is_valid_move(&card("2", Color::Wild, CardType::WildDrawFour)));
        assert!(!game.is_valid_move(&card("3", Color::Blue, CardType::Number(3))));
        assert!(!game.is_valid_move(&card("4", Color::Wild, CardType::Wild)));

        let mut game = fixture(2, card("top", Color::Wild, CardType::WildDrawFour));
        game.current_color = Color::Blue;
        game.pending_draw_count = 4;

        assert!(game.is_valid_move(&card("5", Color::Wild, CardType::WildDrawFour)));
        assert!(!game.is_valid_move(&card("6", Color::Blue, CardType::DrawTwo)));
    }

    #[test]
    fn test_stacking_disabled() {
        let mut game = fixture(2, card("top", Color::Blue, CardType::DrawTwo));
        game.settings.allow_stacking = false;
        game.pending_draw_count = 2;

        assert!(!game.is_valid_move(&card("1", Color::Red, CardType::DrawTwo)));
    }

    #[test]
    fn test_play_card() {
        let mut game = fixture(2, card("top", Color::Blue, CardType::Number(3)));
        let play_me = card("playme", Color::Blue, CardType::Number(1));
        game.players[0].hand = vec![play_me.clone(), card("other", Color::Red, CardType::Number(9))];

        let next = accept(&game, Move::play(play_me));

        assert_eq!(next.discard_pile.last().unwrap().id.as_str(), "playme");
        assert_eq!(next.current_card.id.as_str(), "playme");
        assert_eq!(next.players[0].hand.len(), 1);
        assert_eq!(next.current_player_index, 1);
        // The input is untouched
        assert_eq!(game.players[0].hand.len(), 2);
    }

    #[test]
    fn test_play_rejects_card_not_in_hand() {
        let mut game = fixture(2, green_five());
        game.players[0].hand = vec![filler("a"), filler("b")];

        let err = game
            .try_move_with_rng(
                &Move::play(card("ghost", Color::Green, CardType::Number(1))),
                &mut rng(),
            )
            .unwrap_err();
        assert_eq!(err, GameError::CardNotInHand(CardId::from("ghost")));
    }

    #[test]
    fn test_play_validates_the_card_actually_held() {
        let mut game = fixture(2, green_five());
        game.players[0].hand = vec![card("c", Color::Red, CardType::Number(1)), filler("f")];

        // The move misreports the card as green
        let claimed = card("c", Color::Green, CardType::Number(1));
        assert!(matches!(
            game.try_move_with_rng(&Move::play(claimed), &mut rng()),
            Err(GameError::IllegalCard(_))
        ));
    }

    #[test]
    fn test_rejection_returns_the_same_state_every_time() {
        let mut game = fixture(2, green_five());
        game.players[0].hand = vec![card("red1", Color::Red, CardType::Number(1)), filler("f")];
        let illegal = Move::play(card("red1", Color::Red, CardType::Number(1)));

        let first = game.execute_move_with_rng(&illegal, &mut rng());
        let second = game.execute_move_with_rng(&illegal, &mut rng());

        assert!(matches!(first, Cow::Borrowed(s) if std::ptr::eq(s, &game)));
        assert!(matches!(second, Cow::Borrowed(s) if std::ptr::eq(s, &game)));
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_draw_two_stacks_in_two_player_game() {
        let mut game = fixture(2, card("prev", Color::Blue, CardType::DrawTwo));
        let d2 = card("d2", Color::Blue, CardType::DrawTwo);
        game.players[0].hand = vec![d2.clone(), filler("f")];
        game.pending_draw_count = 2;

        let next = accept(&game, Move::play(d2));

        assert_eq!(next.pending_draw_count, 4);
        assert_eq!(next.current_player_index, 1);
    }

    #[test]
    fn test_draw_absorbs_penalty_and_ends_turn() {
        let mut game = fixture(3, card("prev", Color::Blue, CardType::DrawTwo));
        game.players[0].hand = vec![filler("f")];
        game.pending_draw_count = 4;

        let next = accept(&game, Move::Draw);

        assert_eq!(next.players[0].hand.len(), 5);
        assert_eq!(next.pending_draw_count, 0);
        assert_eq!(next.current_player_index, 1);
        assert_eq!(next.turn_phase, TurnPhase::Normal);
    }

    #[test]
    fn test_draw_then_play_drawn_card() {
        let mut game = fixture(2, card("top", Color::Red, CardType::Number(2)));
        game.players[0].hand = vec![filler("f")];
        game.draw_pile = vec![card("drawme", Color::Red, CardType::Number(5))];

        let drawn = accept(&game, Move::Draw);
        assert_eq!(drawn.turn_phase, TurnPhase::AfterDraw);
        assert_eq!(drawn.drawn_card.as_ref().unwrap().id.as_str(), "drawme");
        assert_eq!(drawn.current_player_index, 0);

        // A red 8 would match normally, but only the drawn card counts now
        assert!(!drawn.is_valid_move(&card("other", Color::Red, CardType::Number(8))));

        let the_card = drawn.players[0]
            .find_card(&CardId::from("drawme"))
            .cloned()
            .unwrap();
        let played = accept(&drawn, Move::play(the_card));
        assert_eq!(played.turn_phase, TurnPhase::Normal);
        assert!(played.drawn_card.is_none());
        assert_eq!(played.current_player_index, 1);
        assert_eq!(played.current_card.id.as_str(), "drawme");
    }

    #[test]
    fn test_draw_then_pass() {
        let mut game = fixture(2, card("top", Color::Red, CardType::Number(2)));
        game.players[0].hand = vec![filler("f")];
        game.draw_pile = vec![card("drawme", Color::Red, CardType::Number(5))];

        let drawn = accept(&game, Move::Draw);
        assert_eq!(drawn.turn_phase, TurnPhase::AfterDraw);

        let passed = accept(&drawn, Move::Pass);
        assert_eq!(passed.turn_phase, TurnPhase::Normal);
        assert!(passed.drawn_card.is_none());
        assert_eq!(passed.current_player_index, 1);
        assert_eq!(passed.players[0].hand.len(), 2);
    }

    #[test]
    fn test_draw_unplayable_card_ends_turn() {
        let mut game = fixture(3, card("top", Color::Red, CardType::Number(2)));
        game.players[0].hand = vec![filler("f")];

        let next = accept(&game, Move::Draw);

        assert_eq!(next.turn_phase, TurnPhase::Normal);
        assert_eq!(next.current_player_index, 1);
        assert_eq!(next.players[0].hand.len(), 2);
    }

    #[test]
    fn test_draw_twice_is_rejected() {
        let mut game = fixture(2, card("top", Color::Red, CardType::Number(2)));
        game.draw_pile = vec![
            card("spare", Color::Blue, CardType::Number(1)),
            card("drawme", Color::Red, CardType::Number(5)),
        ];
        let drawn = accept(&game, Move::Draw);

        assert_eq!(
            drawn.try_move_with_rng(&Move::Draw, &mut rng()),
            Err(GameError::DrawnCardPending)
        );
    }

    #[test]
    fn test_pass_outside_after_draw_is_rejected() {
        let game = fixture(2, green_five());
        let result = game.execute_move_with_rng(&Move::Pass, &mut rng());
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_draw_from_exhausted_deck_ends_turn() {
        let mut game = fixture(2, green_five());
        game.draw_pile.clear();

        let next = accept(&game, Move::Draw);

        assert!(next.players[0].hand.is_empty());
        assert_eq!(next.current_player_index, 1);
    }

    fn wild_draw_four_pending() -> GameState {
        let mut game = fixture(2, card("wd4", Color::Wild, CardType::WildDrawFour));
        game.current_player_index = 1;
        game.pending_draw_count = 4;
        game.current_color = Color::Blue;
        game.previous_color = Some(Color::Red);
        game
    }

    #[test]
    fn test_challenge_guilty() {
        let mut game = wild_draw_four_pending();
        game.players[0].hand = vec![card("oops", Color::Red, CardType::Number(1))];

        let next = accept(&game, Move::Challenge);

        assert_eq!(next.players[0].hand.len(), 5);
        assert!(next.players[1].hand.is_empty());
        assert_eq!(next.current_player_index, 1);
        assert_eq!(next.pending_draw_count, 0);
    }

    #[test]
    fn test_challenge_guilty_pays_the_whole_stack() {
        let mut game = wild_draw_four_pending();
        game.pending_draw_count = 8;
        game.players[0].hand = vec![card("oops", Color::Red, CardType::Number(1))];

        let next = accept(&game, Move::Challenge);
        assert_eq!(next.players[0].hand.len(), 9);
    }

    #[test]
    fn test_challenge_innocent() {
        let mut game = wild_draw_four_pending();
        game.players[0].hand = vec![card("ok", Color::Blue, CardType::Number(1))];

        let next = accept(&game, Move::Challenge);

        assert_eq!(next.players[1].hand.len(), 6);
        assert_eq!(next.players[0].hand.len(), 1);
        assert_eq!(next.current_player_index, 0);
        assert_eq!(next.pending_draw_count, 0);
    }

    #[test]
    fn test_challenge_defaults_to_red_without_snapshot() {
        let mut game = wild_draw_four_pending();
        game.previous_color = None;
        game.players[0].hand = vec![card("r", Color::Red, CardType::Skip)];

        let next = accept(&game, Move::Challenge);
        assert_eq!(next.players[0].hand.len(), 5);
    }

    #[test]
    fn test_challenge_targets_previous_player_counter_clockwise() {
        let mut game = fixture(3, card("wd4", Color::Wild, CardType::WildDrawFour));
        game.direction = Direction::CounterClockwise;
        game.current_player_index = 1;
        game.pending_draw_count = 4;
        game.previous_color = Some(Color::Green);
        // Counter-clockwise, the player before 1 is 2
        game.players[2].hand = vec![card("g", Color::Green, CardType::Number(4))];
        game.players[0].hand = vec![card("g2", Color::Green, CardType::Number(4))];

        let next = accept(&game, Move::Challenge);
        assert_eq!(next.players[2].hand.len(), 5);
        assert_eq!(next.players[0].hand.len(), 1);
    }

    #[test]
    fn test_challenge_needs_pending_wild_draw_four() {
        let mut game = fixture(2, card("d2", Color::Blue, CardType::DrawTwo));
        game.pending_draw_count = 4;
        assert_eq!(
            game.try_move_with_rng(&Move::Challenge, &mut rng()),
            Err(GameError::NoChallengeAvailable)
        );

        let mut game = wild_draw_four_pending();
        game.pending_draw_count = 0;
        assert!(matches!(
            game.execute_move_with_rng(&Move::Challenge, &mut rng()),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_challenge_uno_penalizes_silent_player() {
        let mut game = fixture(3, green_five());
        game.players[2].hand = vec![filler("last")];

        let next = accept(&game, Move::challenge_uno("p2"));

        assert_eq!(next.players[2].hand.len(), 3);
        assert!(!next.players[2].has_called_uno);
        assert_eq!(next.current_player_index, 0);
    }

    #[test]
    fn test_challenge_uno_is_noop_when_called() {
        let mut game = fixture(3, green_five());
        game.players[2].hand = vec![filler("last")];
        game.players[2].has_called_uno = true;

        let next = game.execute_move_with_rng(&Move::challenge_uno("p2"), &mut rng());

        assert!(matches!(next, Cow::Owned(_)));
        assert_eq!(*next, game);
    }

    #[test]
    fn test_challenge_uno_unknown_target_is_rejected() {
        let game = fixture(2, green_five());
        assert_eq!(
            game.try_move_with_rng(&Move::challenge_uno("nobody"), &mut rng()),
            Err(GameError::UnknownPlayer("nobody".to_string()))
        );
    }

    #[test]
    fn test_skip_in_three_player_game() {
        let mut game = fixture(3, card("top", Color::Blue, CardType::Number(2)));
        let skip = card("skip", Color::Blue, CardType::Skip);
        game.players[0].hand = vec![skip.clone(), filler("f")];

        let next = accept(&game, Move::play(skip));
        assert_eq!(next.current_player_index, 2);
    }

    #[test]
    fn test_reverse_in_three_player_game() {
        let mut game = fixture(3, card("top", Color::Blue, CardType::Number(2)));
        let reverse = card("rev", Color::Blue, CardType::Reverse);
        game.players[1].hand = vec![reverse.clone(), filler("f")];
        game.current_player_index = 1;

        let next = accept(&game, Move::play(reverse));
        assert_eq!(next.direction, Direction::CounterClockwise);
        assert_eq!(next.current_player_index, 0);
    }

    #[test]
    fn test_reverse_in_two_player_game_acts_as_skip() {
        let mut game = fixture(2, card("top", Color::Blue, CardType::Number(2)));
        let reverse = card("rev", Color::Blue, CardType::Reverse);
        game.players[0].hand = vec![reverse.clone(), filler("f")];

        let next = accept(&game, Move::play(reverse));
        assert_eq!(next.direction, Direction::Clockwise);
        assert_eq!(next.current_player_index, 0);
    }

    #[test]
    fn test_wild_sets_chosen_color() {
        let mut game = fixture(2, green_five());
        let wild = card("wild", Color::Wild, CardType::Wild);
        game.players[0].hand = vec![wild.clone(), filler("f")];

        let next = accept(&game, Move::play_wild(wild, Color::Blue));
        assert_eq!(next.current_color, Color::Blue);
        assert_eq!(next.current_player_index, 1);
        assert!(next.previous_color.is_none());
    }

    #[test]
    fn test_wild_without_color_falls_back_to_red() {
        let mut game = fixture(2, green_five());
        let wild = card("wild", Color::Wild, CardType::Wild);
        game.players[0].hand = vec![wild.clone(), filler("f")];

        let next = accept(&game, Move::play(wild));
        assert_eq!(next.current_color, Color::Red);
    }

    #[test]
    fn test_wild_draw_four_snapshots_previous_color() {
        let mut game = fixture(2, green_five());
        let wd4 = card("wd4", Color::Wild, CardType::WildDrawFour);
        game.players[0].hand = vec![wd4.clone(), filler("f1"), filler("f2")];
        game.players[1].hand = vec![card("g", Color::Green, CardType::Number(1)), filler("f3")];

        let next = accept(&game, Move::play_wild(wd4, Color::Yellow));
        assert_eq!(next.previous_color, Some(Color::Green));
        assert_eq!(next.current_color, Color::Yellow);
        assert_eq!(next.pending_draw_count, 4);
        assert_eq!(next.current_player_index, 1);

        // Absorb, then any ordinary play clears the snapshot
        let absorbed = accept(&next, Move::Draw);
        let f1 = absorbed.players[0].find_card(&CardId::from("f1")).cloned().unwrap();
        let after = accept(&absorbed, Move::play(f1));
        assert!(after.previous_color.is_none());
    }

    #[test]
    fn test_uno_flag_bookkeeping() {
        let mut game = fixture(2, green_five());
        let g1 = card("g1", Color::Green, CardType::Number(1));
        game.players[0].hand = vec![g1.clone(), filler("f")];

        let called = accept(
            &game,
            Move::Play {
                card: g1,
                chosen_color: None,
                called_uno: true,
            },
        );
        assert!(called.players[0].has_called_uno);

        let mut game = fixture(2, green_five());
        let g2 = card("g2", Color::Green, CardType::Number(2));
        game.players[0].hand = vec![g2.clone(), filler("f1"), filler("f2")];
        let early = accept(
            &game,
            Move::Play {
                card: g2,
                chosen_color: None,
                called_uno: true,
            },
        );
        assert!(!early.players[0].has_called_uno);
    }

    #[test]
    fn test_win_detection() {
        let mut game = fixture(3, green_five());
        let last = card("win", Color::Green, CardType::Skip);
        game.players[0].hand = vec![last.clone()];

        let next = accept(&game, Move::play(last));

        assert_eq!(next.game_phase, GamePhase::GameOver);
        assert_eq!(next.winner_id.as_deref(), Some("p0"));
        assert_eq!(next.current_player_index, 0);
        assert!(matches!(
            next.execute_move_with_rng(&Move::Draw, &mut rng()),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_move_json_shape() {
        let mv: Move =
            serde_json::from_str(r#"{"type":"challenge_uno","target_player_id":"p1"}"#).unwrap();
        assert_eq!(mv, Move::challenge_uno("p1"));

        let mv: Move = serde_json::from_str(
            r#"{"type":"play","card":{"id":"c","color":"wild","card_type":"wild"}}"#,
        )
        .unwrap();
        assert!(matches!(
            mv,
            Move::Play {
                chosen_color: None,
                called_uno: false,
                ..
            }
        ));

        let state = new_game(&["a", "b"], 3);
        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    /// Plays whole games with a naive policy, checking invariants after every
    /// accepted move.
    #[test]
    fn test_random_playouts_conserve_cards() {
        for seed in 0..20 {
            let players = ["a", "b", "c", "d"][..2 + (seed as usize % 3)].to_vec();
            let mut state = new_game(&players, seed);
            let mut rng = ChaCha20Rng::seed_from_u64(seed + 1000);

            for _ in 0..3000 {
                if state.is_over() {
                    break;
                }
                let player = state.current_player();
                let mv = if state.current_card.card_type == CardType::WildDrawFour
                    && state.pending_draw_count >= 4
                    && rng.random_bool(0.3)
                {
                    Move::Challenge
                } else if let Some(card) =
                    player.hand.iter().find(|c| state.is_valid_move(c)).cloned()
                {
                    Move::Play {
                        card,
                        chosen_color: Some(Color::PLAYABLE[rng.random_range(0..4)]),
                        called_uno: rng.random_bool(0.5),
                    }
                } else if state.turn_phase == TurnPhase::AfterDraw {
                    Move::Pass
                } else {
                    Move::Draw
                };

                let next = state.execute_move_with_rng(&mv, &mut rng);
                assert!(matches!(next, Cow::Owned(_)), "seed {seed}: {mv:?} rejected");
                let next = next.into_owned();

                assert_eq!(next.total_cards(), DECK_SIZE, "seed {seed}");
                assert!(next.current_player_index < next.players.len());
                assert_eq!(next.discard_pile.last(), Some(&next.current_card));
                state = next;
            }

            if let Some(winner) = &state.winner_id {
                assert!(state.player(winner).unwrap().hand.is_empty());
            }
        }
    }
}
