//! Data types shared by the pipeline and its collaborators.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slotkeeper_file_tree::{GameKind, ParseGameKindError, ResolvedOffset};

/// Identifier of a downloadable level.
pub type LevelId = u32;

/// Library-level configuration: the two sandbox roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the live game folders.
    pub install_root: PathBuf,
    /// Directory holding archives, extracted levels and original backups.
    pub library_root: PathBuf,
}

/// One file of a pristine original installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the game folder, `/`-separated.
    pub relative_path: String,
    /// Hex SHA-256 of the file.
    pub digest: String,
}

/// A downloadable level variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// File name of the archive inside the library root.
    pub archive_name: String,
    /// Hex SHA-256 of the archive.
    pub digest: String,
    pub url: String,
    pub kind: GameKind,
}

/// One entry listed by an [`ArchiveReader`](crate::ArchiveReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub is_dir: bool,
}

/// What the launcher needs to start a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub working_dir: PathBuf,
    pub executable: PathBuf,
}

/// Something that can occupy a game's live slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The backed-up original installation of a game.
    Original(GameKind),
    /// An extracted level, played with the engine of `kind`.
    Level { id: LevelId, kind: GameKind },
}

impl Slot {
    /// Engine whose live folder this slot occupies.
    pub fn kind(&self) -> GameKind {
        match self {
            Slot::Original(kind) | Slot::Level { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Original(kind) => write!(f, "{kind}"),
            Slot::Level { id, .. } => write!(f, "level:{id}"),
        }
    }
}

/// A slot reference as typed by a user, before the level kind is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    Original(GameKind),
    Level(LevelId),
}

/// Error returned when a slot reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSlotError {
    #[error("invalid level id: {0}")]
    LevelId(String),
    #[error(transparent)]
    Kind(#[from] ParseGameKindError),
}

impl FromStr for SlotRef {
    type Err = ParseSlotError;

    /// Accepts a game code (`TR4`) or `level:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((prefix, id)) if prefix.eq_ignore_ascii_case("level") => id
                .trim()
                .parse()
                .map(SlotRef::Level)
                .map_err(|_| ParseSlotError::LevelId(id.to_string())),
            _ => Ok(SlotRef::Original(s.parse()?)),
        }
    }
}

/// What currently sits at a game's live path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Absent,
    /// A plain directory, normally the untouched original installation.
    Installed,
    /// A link to the given target.
    Linked(PathBuf),
    /// A regular file where the game folder belongs.
    Occupied,
}

/// Result of a successful [`Pipeline::materialize_original`](crate::Pipeline::materialize_original).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Quarantine directory now holding the verified copy.
    pub quarantine: PathBuf,
    /// Where the prior live directory was preserved.
    pub backup: PathBuf,
    /// Files copied during this call.
    pub copied: usize,
    /// Files whose quarantine copy already had the right digest.
    pub skipped: usize,
}

/// Result of a completed extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Extracted, and the executable offset was found.
    Installed { root: PathBuf, offset: ResolvedOffset },
    /// Extracted, but no signature of the level's kind matched.
    ExecutableNotLocated { root: PathBuf },
}

impl InstallOutcome {
    /// Extraction root of the level.
    pub fn root(&self) -> &std::path::Path {
        match self {
            InstallOutcome::Installed { root, .. } | InstallOutcome::ExecutableNotLocated { root } => {
                root
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_refs_parse() {
        assert_eq!("TR4".parse::<SlotRef>().unwrap(), SlotRef::Original(GameKind::Tr4));
        assert_eq!("level:4242".parse::<SlotRef>().unwrap(), SlotRef::Level(4242));
        assert_eq!("LEVEL: 7".parse::<SlotRef>().unwrap(), SlotRef::Level(7));
        assert!(matches!(
            "level:abc".parse::<SlotRef>(),
            Err(ParseSlotError::LevelId(_))
        ));
        assert!(matches!("TR9".parse::<SlotRef>(), Err(ParseSlotError::Kind(_))));
    }

    #[test]
    fn slot_display_and_kind() {
        let level = Slot::Level {
            id: 4242,
            kind: GameKind::Tr5,
        };
        assert_eq!(level.to_string(), "level:4242");
        assert_eq!(level.kind(), GameKind::Tr5);
        assert_eq!(Slot::Original(GameKind::Ten).to_string(), "TEN");
    }

    #[test]
    fn download_record_json_uses_kind_code() {
        let record = DownloadRecord {
            archive_name: "4242.zip".into(),
            digest: "ab".repeat(32),
            url: "https://example.invalid/4242.zip".into(),
            kind: GameKind::Tr4,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"kind\":\"TR4\""));
        let parsed: DownloadRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
