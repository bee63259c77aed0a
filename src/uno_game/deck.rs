use super::card::{Card, CardType, Color};
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;

pub const DECK_SIZE: usize = 108;

/// Builds the full, unshuffled 108 card deck.
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);

    for color in Color::PLAYABLE {
        // One 0 per color
        deck.push(Card::new(color, CardType::Number(0)));

        // Two of each 1-9
        for number in 1..=9 {
            deck.push(Card::new(color, CardType::Number(number)));
            deck.push(Card::new(color, CardType::Number(number)));
        }

        for _ in 0..2 {
            deck.push(Card::new(color, CardType::Skip));
            deck.push(Card::new(color, CardType::Reverse));
            deck.push(Card::new(color, CardType::DrawTwo));
        }
    }

    for _ in 0..4 {
        deck.push(Card::new(Color::Wild, CardType::Wild));
        deck.push(Card::new(Color::Wild, CardType::WildDrawFour));
    }

    deck
}

/// Uniform Fisher-Yates permutation in place.
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

/// Draws up to `count` cards off the end of `draw_pile`.
///
/// When the draw pile runs dry the discard pile, minus its top card, is
/// shuffled into a new draw pile. If there is nothing left to recycle the
/// draw stops short and fewer cards than requested are returned.
pub fn draw_cards<R: Rng + ?Sized>(
    draw_pile: &mut Vec<Card>,
    discard_pile: &mut Vec<Card>,
    count: usize,
    rng: &mut R,
) -> Vec<Card> {
    let mut drawn = Vec::with_capacity(count);

    for _ in 0..count {
        if draw_pile.is_empty() && !recycle_discard(draw_pile, discard_pile, rng) {
            warn!(
                "Deck exhausted: drew {} of {} requested cards",
                drawn.len(),
                count
            );
            break;
        }
        if let Some(card) = draw_pile.pop() {
            drawn.push(card);
        }
    }

    drawn
}

/// Moves everything but the top discard into the draw pile and shuffles it.
/// Returns false when the discard pile has no cards to spare.
fn recycle_discard<R: Rng + ?Sized>(
    draw_pile: &mut Vec<Card>,
    discard_pile: &mut Vec<Card>,
    rng: &mut R,
) -> bool {
    if discard_pile.len() <= 1 {
        return false;
    }
    let Some(top) = discard_pile.pop() else {
        return false;
    };
    draw_pile.append(discard_pile);
    shuffle(draw_pile, rng);
    discard_pile.push(top);
    true
}
