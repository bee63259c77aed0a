use super::card::{Card, CardId};
use serde::{Deserialize, Serialize};

pub type PlayerId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub hand: Vec<Card>,
    pub has_called_uno: bool,
    /// Reserved; no rule reads it yet.
    pub is_safe: bool,
    /// Seats with `is_human == false` are driven by the baseline AI.
    pub is_human: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hand: Vec::new(),
            has_called_uno: false,
            is_safe: false,
            is_human: true,
        }
    }

    pub fn ai(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            is_human: false,
            ..Self::new(id, name)
        }
    }

    /// Adds a card to the player's hand.
    pub fn add_card(&mut self, card: Card) {
        self.hand.push(card);
    }

    /// Removes the card with the given id, if the player holds it.
    pub fn remove_card(&mut self, card_id: &CardId) -> Option<Card> {
        let index = self.hand.iter().position(|c| &c.id == card_id)?;
        Some(self.hand.remove(index))
    }

    pub fn find_card(&self, card_id: &CardId) -> Option<&Card> {
        self.hand.iter().find(|c| &c.id == card_id)
    }

    /// Checks if the player has won (i.e., their hand is empty).
    pub fn has_won(&self) -> bool {
        self.hand.is_empty()
    }
}
