use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::ops::Deref;
use std::path::Path;

use crate::core::error::DeckError;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Deck contents, either mapped or buffered. UTF-8 is checked once when
/// the deck is read.
#[derive(Debug)]
pub enum DeckText {
    Mapped(Mmap),
    Buffered(String),
}

impl Deref for DeckText {
    type Target = str;

    fn deref(&self) -> &str {
        match self {
            // Safety: validated as UTF-8 in `read_deck`, and the mapping is read-only
            DeckText::Mapped(mmap) => unsafe { std::str::from_utf8_unchecked(mmap) },
            DeckText::Buffered(s) => s.as_str(),
        }
    }
}

impl AsRef<str> for DeckText {
    fn as_ref(&self) -> &str {
        self
    }
}

/// Read a whole deck as UTF-8 text.
/// Large decks are memory-mapped and borrowed in place; invalid UTF-8 counts
/// as unreadable.
pub fn read_deck<P: AsRef<Path>>(path: P) -> Result<DeckText, DeckError> {
    let path = path.as_ref();
    let unreadable = |source: io::Error| DeckError::UnreadableDeck {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(path).map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    if metadata.len() > MMAP_THRESHOLD {
        let file = File::open(path).map_err(unreadable)?;

        // Safety: we only read the mapping
        let mmap = unsafe { Mmap::map(&file) }.map_err(unreadable)?;

        std::str::from_utf8(&mmap)
            .map_err(|e| unreadable(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(DeckText::Mapped(mmap))
    } else {
        let bytes = fs::read(path).map_err(unreadable)?;
        String::from_utf8(bytes)
            .map(DeckText::Buffered)
            .map_err(|e| unreadable(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Atomic write with robust temp file strategy
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    // Prefer same-dir tempfile; fall back to OS temp on EPERM/ENOENT
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Preserve original permissions
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = match tempfile::NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new().context("create temp file")?,
    };

    let mut file = tmp.as_file();
    file.write_all(data)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    file.sync_all()?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    // Atomically replace the destination
    if let Err(e) = tmp.persist(path) {
        // Different filesystem? Try copy fallback
        fs::copy(e.file.path(), path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_small_deck() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("main.k");
        fs::write(&p, "*KEYWORD\n*END\n").unwrap();
        let text = read_deck(&p).unwrap();
        assert!(matches!(text, DeckText::Buffered(_)));
        assert_eq!(&*text, "*KEYWORD\n*END\n");
    }

    #[test]
    fn reads_large_deck_through_mmap() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("big.k");
        let body = "$ padding line for a big deck\n".repeat(40_000);
        fs::write(&p, &body).unwrap();
        let text = read_deck(&p).unwrap();
        assert!(matches!(text, DeckText::Mapped(_)));
        assert_eq!(&*text, body);
    }

    #[test]
    fn missing_and_invalid_decks_are_unreadable() {
        let tmp = TempDir::new().unwrap();
        let err = read_deck(tmp.path().join("nope.k")).unwrap_err();
        assert!(matches!(err, DeckError::UnreadableDeck { .. }));

        let bad = tmp.path().join("bad.k");
        fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(read_deck(&bad).unwrap_err(), DeckError::UnreadableDeck { .. }));

        assert!(matches!(read_deck(tmp.path()).unwrap_err(), DeckError::UnreadableDeck { .. }));
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("main.k");
        fs::write(&p, "old").unwrap();
        write_atomic(&p, b"new").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "new");
    }
}
