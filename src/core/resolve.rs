//! Resolve referenced filenames against an ordered list of directories.
//!
//! The first directory containing the file wins; there is no search for a
//! "better" match further down the list.

use std::path::PathBuf;

use tracing::trace;

use crate::core::error::DeckError;

/// Find `filename` in the first of `search_dirs` that holds it as a regular file
pub fn resolve(
    filename: &str,
    search_dirs: &[PathBuf],
) -> Result<PathBuf, DeckError> {
    for dir in search_dirs {
        let candidate = dir.join(filename);
        trace!(candidate = %candidate.display(), "probing");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(DeckError::MissingInclude { name: filename.to_string() })
}

/// Outcome of resolving a whole reference list
#[derive(Debug, Default)]
pub struct Resolution {
    /// `(reference as written, resolved path)` in reference order
    pub found: Vec<(String, PathBuf)>,
    /// References that matched no directory, in reference order
    pub missing: Vec<String>,
}

/// Resolve every reference in order, keeping hits and misses apart
pub fn resolve_all<S: AsRef<str>>(
    references: &[S],
    search_dirs: &[PathBuf],
) -> Resolution {
    let mut out = Resolution::default();

    for reference in references {
        let reference = reference.as_ref();
        match resolve(reference, search_dirs) {
            Ok(path) => out.found.push((reference.to_string(), path)),
            Err(_) => out.missing.push(reference.to_string()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn deck_dir_copy_wins_over_include_path() {
        let tmp = TempDir::new().unwrap();
        let deck_dir = tmp.path().join("deck");
        let shared = tmp.path().join("shared");
        fs::create_dir_all(&deck_dir).unwrap();
        fs::create_dir_all(&shared).unwrap();
        fs::write(deck_dir.join("part_1.k"), "local").unwrap();
        fs::write(shared.join("part_1.k"), "shared").unwrap();

        let found = resolve("part_1.k", &[deck_dir.clone(), shared]).unwrap();
        assert_eq!(found.parent(), Some(deck_dir.as_path()));
    }

    #[test]
    fn falls_through_to_later_dirs() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("part_1.k"), "").unwrap();

        let found = resolve("part_1.k", &[tmp.path().to_path_buf(), shared.clone()]).unwrap();
        assert_eq!(found, shared.join("part_1.k"));
    }

    #[test]
    fn directories_do_not_count_as_hits() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("part_1.k")).unwrap();

        let err = resolve("part_1.k", &[tmp.path().to_path_buf()]).unwrap_err();
        assert!(err.is_missing_include());
    }

    #[test]
    fn resolve_all_keeps_order_and_misses() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.k"), "").unwrap();
        fs::write(tmp.path().join("b.k"), "").unwrap();

        let r = resolve_all(&["b.k", "gone.k", "a.k", "b.k"], &[tmp.path().to_path_buf()]);
        let names: Vec<&str> = r.found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b.k", "a.k", "b.k"]);
        assert_eq!(r.missing, vec!["gone.k"]);
    }
}
