//! **keyup** - keep simulation input decks pointed at the newest include files
//!
//! Scans `*INCLUDE` / `*INCLUDE_PATH` directives, groups files into version
//! families by name, reports and rewrites stale references, and flattens decks
//! with their direct includes into self-contained export directories.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Deck processing core
pub mod core {
    /// Error taxonomy shared by the pipeline
    pub mod error;
    pub use error::DeckError;

    /// Numeric multi-segment versions
    pub mod version;
    pub use version::Version;

    /// Include directive extraction (line state machine)
    pub mod directive;
    pub use directive::{Directives, scan};

    /// Ordered directory search for referenced files
    pub mod resolve;
    pub use resolve::resolve;

    /// Flyweight file registry and version families
    pub mod registry;
    pub use registry::{FamilyId, FamilyKey, FileDescriptor, Registry};

    /// Stale-reference planning and one-pass rewrite
    pub mod plan;
    pub use plan::{DeckReport, MissingRef, RewritePlan, StaleRef, plan_deck};

    /// check / update commands over a batch of decks
    pub mod check;
    pub use check::{run_check as check_run, run_update as update_run};

    /// Flattened export of a deck and its includes
    pub mod export;
    pub use export::{Flattened, flatten, run as export_run};
}

/// Infrastructure - configuration, I/O, logging, prompts
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config, load_config_or_default};

    /// Deck reading (mmap for large decks) and atomic rewrites
    pub mod io;
    pub use io::{DeckText, read_deck, write_atomic};

    /// tracing subscriber setup
    pub mod logging;

    /// Interactive yes/no confirmation
    pub mod prompt;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{check_run, export_run, update_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use crate::core::{DeckError, FileDescriptor, Registry, RewritePlan, Version};
