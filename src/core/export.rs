//! Flatten a deck and its direct includes into one directory.
//!
//! The exported deck drops its `*INCLUDE_PATH` blocks and references every
//! include by bare filename; the includes are copied next to it. Only direct
//! includes of the top-level deck are followed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::cli::{AppContext, ExportArgs};
use crate::core::directive::{DirectiveLines, LineRole, bare_name, deck_dir, scan_stripped, strip_noise};
use crate::core::error::DeckError;
use crate::core::plan::MissingRef;
use crate::core::resolve::resolve;
use crate::infra::config::load_config_or_default;
use crate::infra::io::read_deck;

/// A deck ready to be written out flat
#[derive(Debug, Clone, Serialize)]
pub struct Flattened {
    pub deck: PathBuf,
    /// Rewritten deck text (noise stripped, bare include names)
    pub text: String,
    /// Resolved include files to copy, in reference order, de-duplicated
    pub dependencies: Vec<PathBuf>,
    /// References skipped under force mode
    pub missing: Vec<MissingRef>,
}

/// Drop include-path blocks and reduce include values to bare filenames.
/// `clean` must already be noise-stripped.
pub fn flatten_text(clean: &str) -> String {
    let mut out = String::with_capacity(clean.len());

    for (role, line) in DirectiveLines::new(clean) {
        match role {
            LineRole::IncludePathMarker | LineRole::IncludePathValue => {}
            LineRole::IncludeValue(_) => {
                let value = line.trim_end();
                out.push_str(bare_name(value));
                out.push_str(&line[value.len()..]);
            }
            LineRole::Plain | LineRole::IncludeMarker(_) => out.push_str(line),
        }
    }

    out
}

/// Resolve every include of `deck` and produce its flattened text.
/// Without `force` the first missing include aborts the deck.
#[instrument(skip_all, fields(deck = %deck.display(), force = force))]
pub fn flatten(
    deck: &Path,
    text: &str,
    force: bool,
) -> Result<Flattened, DeckError> {
    let clean = strip_noise(text);
    let directives = scan_stripped(&clean);
    let search_dirs = directives.search_dirs(&deck_dir(deck));

    let mut dependencies = IndexSet::new();
    let mut missing = Vec::new();

    for reference in &directives.includes {
        match resolve(reference, &search_dirs) {
            Ok(path) => {
                debug!(reference = %reference, path = %path.display(), "resolved");
                dependencies.insert(path);
            }
            Err(e) if e.is_missing_include() => {
                error!(deck = %deck.display(), missing = %reference, "include does not exist");
                if !force {
                    return Err(e);
                }
                missing.push(MissingRef {
                    deck: deck.to_path_buf(),
                    missing_name: reference.clone(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Flattened {
        deck: deck.to_path_buf(),
        text: flatten_text(&clean),
        dependencies: dependencies.into_iter().collect(),
        missing,
    })
}

/// `<root or deck dir>/<deck file name without its final extension>`.
/// A deck without an extension gets `<name>_export` so the directory never
/// lands on the deck itself.
pub fn export_dir(
    deck: &Path,
    output_root: Option<&Path>,
) -> PathBuf {
    let stem = deck
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());

    let parent = match output_root {
        Some(root) => root.to_path_buf(),
        None => deck_dir(deck),
    };

    if deck.extension().is_none() {
        parent.join(format!("{stem}_export"))
    } else {
        parent.join(stem)
    }
}

/// Existing file's canonical path; `None` when nothing is there yet
fn existing(path: &Path) -> Option<PathBuf> {
    dunce::canonicalize(path).ok()
}

/// Create `dir`, write the flattened deck and copy every dependency in.
/// Nothing is written when that would overwrite the deck or one of its
/// dependencies; a dependency already sitting at its target is left alone.
pub fn write_export(
    flat: &Flattened,
    dir: &Path,
) -> Result<(), DeckError> {
    fs::create_dir_all(dir).map_err(|e| DeckError::io(dir, e))?;

    let deck_name = flat
        .deck
        .file_name()
        .ok_or_else(|| DeckError::io(&flat.deck, std::io::Error::other("deck has no file name")))?;
    let deck_out = dir.join(deck_name);

    let mut sources = HashSet::new();
    sources.extend(existing(&flat.deck));
    for dep in &flat.dependencies {
        let real = dunce::canonicalize(dep).map_err(|e| DeckError::io(dep, e))?;
        sources.insert(real);
    }

    if existing(&deck_out).is_some_and(|p| sources.contains(&p)) {
        return Err(DeckError::ExportOverwrite { path: deck_out });
    }

    // Validate every copy before touching anything
    let mut copies = Vec::with_capacity(flat.dependencies.len());
    // Flat layout: two includes with one base name collide
    let mut placed: IndexMap<PathBuf, &Path> = IndexMap::new();

    for dep in &flat.dependencies {
        let Some(name) = dep.file_name() else {
            continue;
        };
        if name == deck_name {
            return Err(DeckError::ExportOverwrite { path: dep.clone() });
        }

        let target = dir.join(name);
        match existing(&target) {
            Some(real) if existing(dep).as_ref() == Some(&real) => {
                debug!(path = %dep.display(), "already in the export directory");
                continue;
            }
            Some(real) if sources.contains(&real) => {
                return Err(DeckError::ExportOverwrite { path: target });
            }
            _ => {}
        }

        if let Some(previous) = placed.insert(target.clone(), dep.as_path()) {
            warn!(
                first = %previous.display(),
                second = %dep.display(),
                "two includes share a file name; the later one wins"
            );
        }
        copies.push((dep, target));
    }

    fs::write(&deck_out, &flat.text).map_err(|e| DeckError::io(&deck_out, e))?;

    for (dep, target) in copies {
        debug!(from = %dep.display(), to = %target.display(), "copy");
        fs::copy(dep, &target).map_err(|e| DeckError::io(dep, e))?;
    }

    Ok(())
}

pub fn run(
    args: ExportArgs,
    ctx: &AppContext,
) -> Result<()> {
    let config = load_config_or_default();
    let force = args.force || config.export.force;
    let output_root = match args.output {
        Some(p) => Some(p),
        None => config.export.output_dir()?,
    };

    if let Some(root) = &output_root {
        if !ctx.dry_run && !root.exists() {
            debug!(root = %root.display(), "creating export root");
            fs::create_dir_all(root)
                .with_context(|| format!("Failed to create output dir {}", root.display()))?;
        }
    }

    let progress = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.decks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("progress template")?
                .progress_chars("#>-"),
        );
        pb
    };

    let mut failed = 0usize;

    for deck in &args.decks {
        progress.set_message(format!("{}", deck.display()));

        match export_one(deck, output_root.as_deref(), force, ctx) {
            Ok(dir) => {
                progress.suspend(|| {
                    if !ctx.quiet {
                        let verb = if ctx.dry_run { "Would export" } else { "Exported" };
                        println!("{} {verb} {} -> {}", "✓".green(), deck.display(), dir.display());
                    }
                });
            }
            // Already reported by `flatten`
            Err(e) if e.is_missing_include() => {
                error!(deck = %deck.display(), "export aborted (use --force to skip missing includes)");
                failed += 1;
            }
            Err(e) => {
                error!(deck = %deck.display(), error = %e, "export failed");
                failed += 1;
            }
        }

        progress.inc(1);
    }

    progress.finish_and_clear();

    if failed > 0 {
        anyhow::bail!("{failed} of {} deck(s) could not be exported", args.decks.len());
    }

    Ok(())
}

fn export_one(
    deck: &Path,
    output_root: Option<&Path>,
    force: bool,
    ctx: &AppContext,
) -> Result<PathBuf, DeckError> {
    info!(deck = %deck.display(), "export");

    let text = read_deck(deck)?;
    let flat = flatten(deck, &text, force)?;
    let dir = export_dir(deck, output_root);

    if ctx.dry_run {
        if !ctx.quiet {
            println!("{}", format!("DRY RUN: would create {}", dir.display()).yellow());
            for dep in &flat.dependencies {
                println!("  {}", dep.display());
            }
        }
        return Ok(dir);
    }

    write_export(&flat, &dir)?;
    Ok(dir)
}
