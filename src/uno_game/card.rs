use serde::{Deserialize, Serialize};
use std::fmt;

/// Card colors. `Wild` is only ever carried by wild cards; the color a wild
/// declares lives in `GameState::current_color`, never on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Yellow,
    Green,
    Blue,
    Wild,
}

impl Color {
    /// The four colors a wild card may declare.
    pub const PLAYABLE: [Color; 4] = [Color::Red, Color::Yellow, Color::Green, Color::Blue];
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Red => "Red",
            Color::Yellow => "Yellow",
            Color::Green => "Green",
            Color::Blue => "Blue",
            Color::Wild => "Wild",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl CardType {
    pub fn is_wild(&self) -> bool {
        matches!(self, CardType::Wild | CardType::WildDrawFour)
    }

    /// Whether two card types share a kind, ignoring number values.
    pub fn same_kind(&self, other: &CardType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Opaque unique card token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub color: Color,
    pub card_type: CardType,
}

impl Card {
    pub fn new(color: Color, card_type: CardType) -> Self {
        Self::with_id(CardId::new(), color, card_type)
    }

    pub fn with_id(id: impl Into<CardId>, color: Color, card_type: CardType) -> Self {
        Self {
            id: id.into(),
            color,
            card_type,
        }
    }

    pub fn is_wild(&self) -> bool {
        self.card_type.is_wild()
    }

    pub fn number(&self) -> Option<u8> {
        match self.card_type {
            CardType::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.card_type {
            CardType::Number(n) => write!(f, "{} {}", self.color, n),
            CardType::Skip => write!(f, "{} Skip", self.color),
            CardType::Reverse => write!(f, "{} Reverse", self.color),
            CardType::DrawTwo => write!(f, "{} Draw Two", self.color),
            CardType::Wild => write!(f, "Wild"),
            CardType::WildDrawFour => write!(f, "Wild Draw Four"),
        }
    }
}
