//! Include directive extraction from raw deck text.
//!
//! Decks are line oriented. Two directive blocks matter here:
//!
//! ```text
//! *INCLUDE_PATH
//! /shared/includes
//! *INCLUDE            (or *INCLUDE_TRANSFORM)
//! sub/part_003.k
//! ```
//!
//! Continuation markers (`  +` at end of line) and `$` comment lines are
//! removed first so that blocks split by either are still seen intact.
//! Everything else is opaque and passes through untouched.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::SplitInclusive;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

const INCLUDE_PATH: &str = "*INCLUDE_PATH";
const INCLUDE: &str = "*INCLUDE";
const INCLUDE_TRANSFORM: &str = "*INCLUDE_TRANSFORM";

/// Continuation sequences and full comment lines
static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)[ \t]+\+\r?\n|^\$[^\n]*(?:\n|\z)").expect("valid noise pattern")
});

/// Remove continuation markers and comment lines before scanning
pub fn strip_noise(text: &str) -> Cow<'_, str> {
    NOISE.replace_all(text, "")
}

/// Keyword that introduced a referenced filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    Transform,
}

/// Classification of a single physical line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Plain,
    IncludePathMarker,
    IncludePathValue,
    IncludeMarker(IncludeKind),
    IncludeValue(IncludeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    AfterIncludePath,
    AfterInclude(IncludeKind),
}

/// Line scanner yielding each raw line (newline included) with its role
pub struct DirectiveLines<'a> {
    lines: SplitInclusive<'a, char>,
    state: State,
}

impl<'a> DirectiveLines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.split_inclusive('\n'),
            state: State::Normal,
        }
    }
}

impl<'a> Iterator for DirectiveLines<'a> {
    type Item = (LineRole, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;

        let role = match self.state {
            State::AfterIncludePath => {
                self.state = State::Normal;
                LineRole::IncludePathValue
            }
            State::AfterInclude(kind) => {
                self.state = State::Normal;
                LineRole::IncludeValue(kind)
            }
            State::Normal => match line.trim_end() {
                INCLUDE_PATH => {
                    self.state = State::AfterIncludePath;
                    LineRole::IncludePathMarker
                }
                INCLUDE => {
                    self.state = State::AfterInclude(IncludeKind::Include);
                    LineRole::IncludeMarker(IncludeKind::Include)
                }
                INCLUDE_TRANSFORM => {
                    self.state = State::AfterInclude(IncludeKind::Transform);
                    LineRole::IncludeMarker(IncludeKind::Transform)
                }
                _ => LineRole::Plain,
            },
        };

        Some((role, line))
    }
}

/// Declared search directories and referenced files, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub include_paths: Vec<String>,
    pub includes: Vec<String>,
}

impl Directives {
    /// Candidate directories: the deck's own first, then every declared
    /// include path that exists, in declaration order.
    pub fn search_dirs(
        &self,
        deck_dir: &Path,
    ) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(self.include_paths.len() + 1);
        dirs.push(deck_dir.to_path_buf());

        for declared in &self.include_paths {
            let p = Path::new(declared);
            let full = if p.is_absolute() {
                p.to_path_buf()
            } else {
                deck_dir.join(p)
            };

            if full.is_dir() {
                dirs.push(full);
            } else {
                debug!(path = %declared, "dropping include path that is not a directory");
            }
        }

        dirs
    }
}

/// Scan deck text for include directives. Noise is stripped here.
pub fn scan(text: &str) -> Directives {
    scan_stripped(&strip_noise(text))
}

/// Scan text that has already been through [`strip_noise`]
pub fn scan_stripped(clean: &str) -> Directives {
    let mut out = Directives::default();

    for (role, line) in DirectiveLines::new(clean) {
        let value = line.trim();
        match role {
            LineRole::IncludePathValue if !value.is_empty() => {
                out.include_paths.push(value.to_string())
            }
            LineRole::IncludeValue(_) if !value.is_empty() => out.includes.push(value.to_string()),
            _ => {}
        }
    }

    out
}

/// Strip any directory component, leaving the bare filename
pub fn bare_name(reference: &str) -> &str {
    match reference.rfind(['/', '\\']) {
        Some(i) => &reference[i + 1..],
        None => reference,
    }
}

/// Directory a deck lives in; `.` for bare relative names
pub fn deck_dir(deck: &Path) -> PathBuf {
    match deck.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
