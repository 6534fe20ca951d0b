//! Error taxonomy for the deck pipeline.
//!
//! None of these are process-fatal: callers decide per deck whether to skip
//! a reference, abort a deck, or carry on with the rest of the batch.

use std::io;
use std::path::PathBuf;

/// Errors raised by the deck core
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// Deck could not be opened or decoded
    #[error("cannot read deck {}: {source}", .path.display())]
    UnreadableDeck {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Referenced file exists in none of the search directories
    #[error("{name} does not exist in any include path")]
    MissingInclude { name: String },

    /// Latest was queried for a family with no members
    #[error("unknown version family: {key}")]
    UnknownFamily { key: String },

    /// Filesystem failure outside deck reading (listing, canonicalizing, copying)
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the export would destroy one of the files being exported
    #[error("export would overwrite its own input {}", .path.display())]
    ExportOverwrite { path: PathBuf },

    /// Rewrite automaton could not be built
    #[error("cannot build rewrite automaton: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

impl DeckError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DeckError::Io { path: path.into(), source }
    }

    /// True when the error only concerns a single reference
    pub fn is_missing_include(&self) -> bool {
        matches!(self, DeckError::MissingInclude { .. })
    }
}
