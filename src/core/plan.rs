//! Stale-reference detection and the rewrite that fixes it.
//!
//! A deck reference is stale when its resolved file is not the latest
//! member of its version family. The plan maps each stale reference, as
//! written in the deck, to the same reference pointing at the latest file,
//! and is applied in one forward pass over the original text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aho_corasick::{AhoCorasick, MatchKind};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::directive::{bare_name, deck_dir, scan};
use crate::core::error::DeckError;
use crate::core::registry::Registry;
use crate::core::resolve::resolve;

/// A reference with a newer sibling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleRef {
    pub deck: PathBuf,
    pub stale_name: String,
    pub latest_name: String,
}

/// A reference that resolved against no candidate directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingRef {
    pub deck: PathBuf,
    pub missing_name: String,
}

/// Insertion-ordered `stale name -> latest name` substitutions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RewritePlan {
    changes: IndexMap<String, String>,
}

impl RewritePlan {
    /// Record a substitution; identity mappings and repeats are ignored.
    /// Returns whether the entry was new.
    pub fn insert(
        &mut self,
        stale: &str,
        latest: &str,
    ) -> bool {
        if stale == latest || self.changes.contains_key(stale) {
            return false;
        }
        self.changes.insert(stale.to_string(), latest.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(
        &self,
        stale: &str,
    ) -> Option<&str> {
        self.changes.get(stale).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.changes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every whole-name occurrence of a stale name in one pass.
    /// Longest match wins where names overlap; substituted output is never
    /// rescanned.
    pub fn apply(
        &self,
        text: &str,
    ) -> Result<String, DeckError> {
        if self.changes.is_empty() {
            return Ok(text.to_string());
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(self.changes.keys())?;

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for m in automaton.find_iter(text) {
            if !is_whole_name(bytes, m.start(), m.end()) {
                continue;
            }

            // Pattern ids follow key insertion order
            let Some((_, latest)) = self.changes.get_index(m.pattern().as_usize()) else {
                continue;
            };

            out.push_str(&text[last..m.start()]);
            out.push_str(latest);
            last = m.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

/// Bytes that can continue a filename or path on either side of a match
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b'\\')
}

/// `reference` with its file name swapped for `name`, directory kept
fn retarget(
    reference: &str,
    name: &str,
) -> String {
    let dir_len = reference.len() - bare_name(reference).len();
    format!("{}{name}", &reference[..dir_len])
}

fn is_whole_name(
    bytes: &[u8],
    start: usize,
    end: usize,
) -> bool {
    let clean_left = start == 0 || !is_name_byte(bytes[start - 1]);
    let clean_right = end == bytes.len() || !is_name_byte(bytes[end]);
    clean_left && clean_right
}

/// Everything learned about one deck
#[derive(Debug, Clone, Serialize)]
pub struct DeckReport {
    pub deck: PathBuf,
    pub plan: RewritePlan,
    pub stale: Vec<StaleRef>,
    pub missing: Vec<MissingRef>,
}

impl DeckReport {
    pub fn is_current(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Resolve, register and sibling-scan every include of `deck`, and plan
/// the substitutions that would point it at the latest versions.
#[instrument(skip_all, fields(deck = %deck.display()))]
pub fn plan_deck(
    registry: &Registry,
    deck: &Path,
    text: &str,
) -> Result<DeckReport, DeckError> {
    let directives = scan(text);
    let search_dirs = directives.search_dirs(&deck_dir(deck));

    let mut report = DeckReport {
        deck: deck.to_path_buf(),
        plan: RewritePlan::default(),
        stale: Vec::new(),
        missing: Vec::new(),
    };

    for reference in &directives.includes {
        let path = match resolve(reference, &search_dirs) {
            Ok(p) => p,
            Err(e) if e.is_missing_include() => {
                warn!(deck = %deck.display(), missing = %reference, "include not found, skipped");
                report.missing.push(MissingRef {
                    deck: deck.to_path_buf(),
                    missing_name: reference.clone(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let file = registry.get_or_create(&path)?;
        registry.scan_siblings(&file)?;
        let latest = registry.latest_of(file.family())?;

        if Arc::ptr_eq(&file, &latest) {
            continue;
        }

        // The rewritten reference must reach the latest file through the
        // same search order, not a same-named file in an earlier directory
        let target = retarget(reference, latest.name());
        let reaches_latest = match resolve(&target, &search_dirs) {
            Ok(p) => Arc::ptr_eq(&registry.get_or_create(&p)?, &latest),
            Err(_) => false,
        };
        if !reaches_latest {
            warn!(
                deck = %deck.display(),
                stale = %reference,
                latest = %latest.path().display(),
                "newer version is shadowed by another search directory, skipped"
            );
            continue;
        }

        if report.plan.insert(reference, &target) {
            info!(
                deck = %deck.display(),
                stale = %reference,
                latest = %target,
                "newer version available"
            );
            report.stale.push(StaleRef {
                deck: deck.to_path_buf(),
                stale_name: reference.clone(),
                latest_name: target,
            });
        }
    }

    Ok(report)
}
