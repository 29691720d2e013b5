use serde::{Deserialize, Serialize};
use std::fmt;

/// Fading level: 1 = two canned replies, 2 = three to four canned replies,
/// 3 = complete the sentence, 4 = free text with suggestion chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const ONE: Level = Level(1);
    pub const TWO: Level = Level(2);
    pub const THREE: Level = Level(3);
    pub const FOUR: Level = Level(4);

    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Level(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One level more support, floored at 1
    pub fn lower(self) -> Self {
        Level(self.0.saturating_sub(1).max(1))
    }

    /// Next level in the selector, wrapping 4 back to 1
    pub fn cycle(self) -> Self {
        if self.0 == 4 {
            Level::ONE
        } else {
            Level(self.0 + 1)
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::ONE
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level must be between 1 and 4, got {value}"))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
