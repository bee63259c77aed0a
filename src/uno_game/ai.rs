//! Baseline computer opponent.
//!
//! Goes through the same `is_valid_move` / `execute_move` contract a human
//! client uses and never looks at anything a client could not send.

use super::card::{Card, CardType, Color};
use super::game::{GameState, Move, TurnPhase};

/// Picks a move for `player_id`, or `None` if that id is not seated.
///
/// Preference order: the card just drawn, action cards, the highest number,
/// then wilds. A Wild Draw Four is held back while the player still has the
/// current color, unless nothing else is playable.
pub fn best_move(state: &GameState, player_id: &str) -> Option<Move> {
    let player = state.player(player_id)?;

    if state.turn_phase == TurnPhase::AfterDraw {
        if let Some(drawn) = &state.drawn_card {
            let chosen_color = drawn.is_wild().then(|| majority_color(&player.hand));
            return Some(Move::Play {
                card: drawn.clone(),
                chosen_color,
                called_uno: player.hand.len() == 2,
            });
        }
        return Some(Move::Pass);
    }

    let playable: Vec<&Card> = player
        .hand
        .iter()
        .filter(|c| state.is_valid_move(c))
        .collect();
    if playable.is_empty() {
        return Some(Move::Draw);
    }

    let holds_current_color = player.hand.iter().any(|c| c.color == state.current_color);
    let mut candidates: Vec<&Card> = playable
        .iter()
        .copied()
        .filter(|c| !(holds_current_color && c.card_type == CardType::WildDrawFour))
        .collect();
    if candidates.is_empty() {
        candidates = playable;
    }

    let action = candidates.iter().find(|c| {
        matches!(
            c.card_type,
            CardType::Skip | CardType::Reverse | CardType::DrawTwo
        )
    });
    let highest_number = candidates
        .iter()
        .filter(|c| c.number().is_some())
        .max_by_key(|c| c.number());
    let wild = candidates.iter().find(|c| c.is_wild());

    let card = action.or(highest_number).or(wild)?;
    let chosen_color = card.is_wild().then(|| majority_color(&player.hand));

    Some(Move::Play {
        card: (*card).clone(),
        chosen_color,
        called_uno: player.hand.len() == 2,
    })
}

/// Calls out the first other player sitting on one card without having called UNO.
pub fn uno_callout(state: &GameState, player_id: &str) -> Option<Move> {
    state
        .players
        .iter()
        .find(|p| p.id != player_id && p.hand.len() == 1 && !p.has_called_uno)
        .map(|p| Move::challenge_uno(p.id.clone()))
}

/// Most common color in `hand`, Red on ties and for an all-wild hand.
fn majority_color(hand: &[Card]) -> Color {
    let mut best = Color::Red;
    let mut best_count = 0;
    for color in Color::PLAYABLE {
        let count = hand.iter().filter(|c| c.color == color).count();
        if count > best_count {
            best = color;
            best_count = count;
        }
    }
    best
}
