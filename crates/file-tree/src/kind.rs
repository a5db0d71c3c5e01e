use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Engine family of an installation.
///
/// Each kind owns a fixed install folder name under the install root and
/// the name of the executable the launcher starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameKind {
    Tr1,
    Tr2,
    Tr3,
    Tr4,
    Tr5,
    Ten,
}

/// Error returned when a string names no known [`GameKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game kind: {0}")]
pub struct ParseGameKindError(pub String);

impl GameKind {
    /// Returns all kinds in id order.
    pub fn all() -> &'static [GameKind] {
        &[
            GameKind::Tr1,
            GameKind::Tr2,
            GameKind::Tr3,
            GameKind::Tr4,
            GameKind::Tr5,
            GameKind::Ten,
        ]
    }

    /// Numeric id used by the level metadata (1-based).
    pub fn id(&self) -> u8 {
        match self {
            GameKind::Tr1 => 1,
            GameKind::Tr2 => 2,
            GameKind::Tr3 => 3,
            GameKind::Tr4 => 4,
            GameKind::Tr5 => 5,
            GameKind::Ten => 6,
        }
    }

    /// Looks a kind up by its numeric id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.id() == id)
    }

    /// Short code, e.g. `TR4`.
    pub fn code(&self) -> &'static str {
        match self {
            GameKind::Tr1 => "TR1",
            GameKind::Tr2 => "TR2",
            GameKind::Tr3 => "TR3",
            GameKind::Tr4 => "TR4",
            GameKind::Tr5 => "TR5",
            GameKind::Ten => "TEN",
        }
    }

    /// Folder name of the live installation under the install root.
    pub fn folder_name(&self) -> &'static str {
        match self {
            GameKind::Tr1 => "Tomb Raider (I)",
            GameKind::Tr2 => "Tomb Raider (II)",
            GameKind::Tr3 => "TombRaider (III)",
            GameKind::Tr4 => "Tomb Raider (IV) The Last Revelation",
            GameKind::Tr5 => "Tomb Raider (V) Chronicles",
            GameKind::Ten => "TombEngine (TEN)",
        }
    }

    /// File name of the game executable.
    pub fn executable_name(&self) -> &'static str {
        match self {
            GameKind::Tr1 => "tomb.exe",
            GameKind::Tr2 => "Tomb2.exe",
            GameKind::Tr3 => "tomb3.exe",
            GameKind::Tr4 => "tomb4.exe",
            GameKind::Tr5 => "PCTOMB5.EXE",
            GameKind::Ten => "TombEngine.exe",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GameKind {
    type Err = ParseGameKindError;

    /// Accepts the short code in any case (`tr4`, `TEN`) or the numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u8>() {
            return Self::from_id(id).ok_or_else(|| ParseGameKindError(s.to_string()));
        }
        Self::all()
            .iter()
            .copied()
            .find(|k| k.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseGameKindError(s.to_string()))
    }
}
