//! Checksum-gated installation pipeline for game slots.
//!
//! A game's live folder under the install root is switched between content
//! kept in the library root by replacing a link, never by copying trees.
//!
//! # Pipeline
//!
//! 1. **Backup**: verify an original installation against its manifest,
//!    copy it into `Original.<code>`, preserve the live folder as
//!    `<name>.old` and link the copy back
//! 2. **Fetch**: download a level archive unless a verified copy exists
//! 3. **Extract**: unpack entry by entry into `<id>.TRLE`, reporting
//!    progress
//! 4. **Resolve**: locate the executable offset by signature matching
//! 5. **Activate**: link the live folder to an original or a level
//!
//! The metadata store, transport and archive format are collaborators
//! behind traits; [`JsonMetadataStore`], [`HttpTransport`] and
//! [`ZipArchiveReader`] are the defaults.

pub mod archive;
pub mod collaborators;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod transport;
pub mod types;

// Re-export primary types for convenience.
pub use archive::ZipArchiveReader;
pub use collaborators::{
    ArchiveError, ArchiveReader, FetchError, LaunchError, Launcher, MetadataError, MetadataStore,
    Transport,
};
pub use error::InstallError;
pub use metadata::{JsonMetadataStore, MetadataDocument};
pub use pipeline::{Collaborators, Pipeline, build_manifest, is_volatile_file};
pub use progress::{PercentTicker, ProgressCallback};
pub use transport::HttpTransport;
pub use types::{
    ArchiveEntry, DownloadRecord, InstallOutcome, LaunchTarget, LevelId, ManifestEntry,
    MaterializeReport, ParseSlotError, PipelineConfig, Slot, SlotRef, SlotState,
};
