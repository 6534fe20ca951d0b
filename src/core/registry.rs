//! File registry and version-family tracking.
//!
//! Every physical file is represented by exactly one `Arc<FileDescriptor>`
//! per registry, keyed by canonical path, so "is this the latest?" is a
//! pointer comparison. Files in one directory whose names differ only in
//! their version digits form a family; each family keeps its members in a
//! max-heap ordered by version so the newest member is a peek away.
//! Same-named files in other directories never compete, so the latest of a
//! family does not depend on which decks were planned before.
//!
//! The registry is an explicit context object. One instance lives for one
//! run and may be shared across worker threads: the flyweight index and the
//! families sit behind a single lock, so registering a file and asking for
//! its family's latest member never interleave.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, trace};

use crate::core::error::DeckError;
use crate::core::version::Version;

/// Stands in for the version digits inside a family key
pub const VERSION_TOKEN: &str = "<#>";

/// `<stem><sep?><digits[.digits]*><.ext>*`
static VERSIONED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>.*?)[_\-. ]?(?P<version>\d+(?:\.\d+)*)(?P<suffix>(?:\.[A-Za-z][A-Za-z0-9]*)*)$")
        .expect("valid versioned-name pattern")
});

/// Filename with its version removed, plus its suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FamilyKey(String);

impl FamilyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A family is a name pattern within one directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FamilyId {
    dir: PathBuf,
    key: FamilyKey,
}

impl FamilyId {
    /// Family that a file called `name` inside `dir` belongs to
    pub fn new(
        dir: &Path,
        name: &str,
    ) -> Self {
        Self {
            dir: dir.to_path_buf(),
            key: classify(name).0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key(&self) -> &FamilyKey {
        &self.key
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dir.display(), self.key)
    }
}

/// Split a base name into its family key and version.
/// Names without a trailing version are their own family at version 0.
pub fn classify(name: &str) -> (FamilyKey, Version) {
    match VERSIONED_NAME.captures(name) {
        Some(caps) => {
            let stem = &caps["stem"];
            let suffix = &caps["suffix"];
            (
                FamilyKey(format!("{stem}{VERSION_TOKEN}{suffix}")),
                Version::parse(&caps["version"]),
            )
        }
        None => (FamilyKey(name.to_string()), Version::default()),
    }
}

/// One physical file on disk. Never mutated after construction.
#[derive(Debug)]
pub struct FileDescriptor {
    path: PathBuf,
    dir: PathBuf,
    name: String,
    family: FamilyId,
    version: Version,
}

impl FileDescriptor {
    fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let (key, version) = classify(&name);
        let family = FamilyId { dir: dir.clone(), key };

        Self { path, dir, name, family, version }
    }

    /// Canonical absolute path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Containing directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base filename
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &FamilyId {
        &self.family
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

/// Heap entry: highest version first, ties broken by path
struct Member(Arc<FileDescriptor>);

impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .version
            .cmp(&other.0.version)
            .then_with(|| self.0.path.cmp(&other.0.path))
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Member {}

/// All known versions of one logical file. Holds strong references so the
/// latest member can never be reclaimed out from under a query.
#[derive(Default)]
struct Family {
    by_version: BinaryHeap<Member>,
    paths: HashSet<PathBuf>,
}

impl Family {
    fn insert(
        &mut self,
        file: Arc<FileDescriptor>,
    ) -> bool {
        if !self.paths.insert(file.path.clone()) {
            return false;
        }
        self.by_version.push(Member(file));
        true
    }

    fn latest(&self) -> Option<&Arc<FileDescriptor>> {
        self.by_version.peek().map(|m| &m.0)
    }
}

#[derive(Default)]
struct RegistryState {
    index: HashMap<PathBuf, Weak<FileDescriptor>>,
    families: HashMap<FamilyId, Family>,
}

/// Flyweight cache of file descriptors plus their version families
pub struct Registry {
    state: Mutex<RegistryState>,
    /// Sibling entries matching these globs are never registered
    scan_ignores: GlobSet,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            scan_ignores: GlobSet::empty(),
        }
    }

    /// Registry whose sibling scans skip file names matching `patterns`
    pub fn with_scan_ignores(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            state: Mutex::new(RegistryState::default()),
            scan_ignores: builder.build()?,
        })
    }

    /// Shared descriptor for `path`, created and registered on first sight
    pub fn get_or_create(
        &self,
        path: &Path,
    ) -> Result<Arc<FileDescriptor>, DeckError> {
        let canonical = dunce::canonicalize(path).map_err(|e| DeckError::io(path, e))?;

        let mut state = self.state.lock();
        if let Some(existing) = state.index.get(&canonical).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let file = Arc::new(FileDescriptor::new(canonical.clone()));
        trace!(path = %canonical.display(), family = %file.family, version = %file.version, "registered");

        state.index.insert(canonical, Arc::downgrade(&file));
        state
            .families
            .entry(file.family.clone())
            .or_default()
            .insert(Arc::clone(&file));

        Ok(file)
    }

    /// Highest-version member currently known for `family`
    pub fn latest_of(
        &self,
        family: &FamilyId,
    ) -> Result<Arc<FileDescriptor>, DeckError> {
        let state = self.state.lock();
        state
            .families
            .get(family)
            .and_then(Family::latest)
            .cloned()
            .ok_or_else(|| DeckError::UnknownFamily { key: family.to_string() })
    }

    /// Register every regular file next to `file`, so its family's latest
    /// reflects what is on disk and not only what decks mention.
    pub fn scan_siblings(
        &self,
        file: &FileDescriptor,
    ) -> Result<usize, DeckError> {
        let entries = fs::read_dir(file.dir()).map_err(|e| DeckError::io(file.dir(), e))?;
        let mut registered = 0;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(dir = %file.dir().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || self.scan_ignores.is_match(entry.file_name()) {
                continue;
            }

            self.get_or_create(&path)?;
            registered += 1;
        }

        debug!(dir = %file.dir().display(), registered, "sibling scan");
        Ok(registered)
    }

    /// Number of members known for `family`
    pub fn family_len(
        &self,
        family: &FamilyId,
    ) -> usize {
        self.state
            .lock()
            .families
            .get(family)
            .map_or(0, |f| f.paths.len())
    }

    /// Number of live descriptors
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .index
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    fn touch(
        dir: &Path,
        name: &str,
    ) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, name).unwrap();
        p
    }

    #[test]
    fn classify_strips_version_and_separator() {
        let (k1, v1) = classify("part_003.k");
        let (k2, v2) = classify("part_007.k");
        assert_eq!(k1, k2);
        assert_eq!(k1.as_str(), "part<#>.k");
        assert!(v1 < v2);

        let (k, v) = classify("body-1.2.10.k.asc");
        assert_eq!(k.as_str(), "body<#>.k.asc");
        assert_eq!(v.parts(), &[1, 2, 10]);
    }

    #[test]
    fn unversioned_names_are_their_own_family() {
        let (k, v) = classify("main.k");
        assert_eq!(k.as_str(), "main.k");
        assert_eq!(v, Version::default());

        // Digits not directly before the suffix are not a version
        let (k, _) = classify("v2_mesh.k");
        assert_eq!(k.as_str(), "v2_mesh.k");
    }

    #[test]
    fn different_suffixes_are_different_families() {
        assert_ne!(classify("a_1.k").0, classify("a_1.i").0);
    }

    #[test]
    fn same_path_yields_same_descriptor() {
        let tmp = TempDir::new().unwrap();
        let p = touch(tmp.path(), "a_001.k");
        let reg = Registry::new();

        let first = reg.get_or_create(&p).unwrap();
        let again = reg
            .get_or_create(&tmp.path().join(".").join("a_001.k"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(reg.family_len(first.family()), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn latest_is_independent_of_registration_order() {
        let tmp = TempDir::new().unwrap();
        let names = ["a_001.k", "a_010.k", "a_002.k"];
        let paths: Vec<PathBuf> = names.iter().map(|n| touch(tmp.path(), n)).collect();

        for order in [[0, 1, 2], [2, 1, 0], [1, 0, 2]] {
            let reg = Registry::new();
            let mut key = None;
            for i in order {
                key = Some(reg.get_or_create(&paths[i]).unwrap().family().clone());
            }
            let latest = reg.latest_of(&key.unwrap()).unwrap();
            assert_eq!(latest.name(), "a_010.k");
        }
    }

    #[test]
    fn unknown_family_is_an_error() {
        let reg = Registry::new();
        let err = reg
            .latest_of(&FamilyId::new(Path::new("/nowhere"), "x_1.k"))
            .unwrap_err();
        assert!(matches!(err, DeckError::UnknownFamily { .. }));
    }

    #[test]
    fn missing_file_cannot_be_registered() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::new();
        let err = reg.get_or_create(&tmp.path().join("ghost_1.k")).unwrap_err();
        assert!(matches!(err, DeckError::Io { .. }));
    }

    #[test]
    fn sibling_scan_discovers_newer_versions() {
        let tmp = TempDir::new().unwrap();
        let referenced = touch(tmp.path(), "part_003.k");
        touch(tmp.path(), "part_007.k");
        touch(tmp.path(), "unrelated.txt");
        fs::create_dir(tmp.path().join("part_009.k")).unwrap();

        let reg = Registry::new();
        let file = reg.get_or_create(&referenced).unwrap();
        assert!(Arc::ptr_eq(&reg.latest_of(file.family()).unwrap(), &file));

        assert_eq!(reg.scan_siblings(&file).unwrap(), 3);
        assert_eq!(reg.latest_of(file.family()).unwrap().name(), "part_007.k");

        // Rescanning registers nothing new
        reg.scan_siblings(&file).unwrap();
        assert_eq!(reg.family_len(file.family()), 2);
    }

    #[test]
    fn scan_ignores_are_honored() {
        let tmp = TempDir::new().unwrap();
        let referenced = touch(tmp.path(), "part_003.k");
        touch(tmp.path(), "part_007.k~");
        touch(tmp.path(), "part_008.k.bak");

        let reg = Registry::with_scan_ignores(&["*~".into(), "*.bak".into()]).unwrap();
        let file = reg.get_or_create(&referenced).unwrap();
        assert_eq!(reg.scan_siblings(&file).unwrap(), 1);
        assert!(Arc::ptr_eq(&reg.latest_of(file.family()).unwrap(), &file));
    }

    #[test]
    fn equal_versions_break_ties_deterministically() {
        let tmp = TempDir::new().unwrap();
        let one = touch(tmp.path(), "m_1.k");
        let other = touch(tmp.path(), "m_01.k");

        let reg_a = Registry::new();
        reg_a.get_or_create(&one).unwrap();
        let key = reg_a.get_or_create(&other).unwrap().family().clone();

        let reg_b = Registry::new();
        reg_b.get_or_create(&other).unwrap();
        reg_b.get_or_create(&one).unwrap();

        assert_eq!(
            reg_a.latest_of(&key).unwrap().name(),
            reg_b.latest_of(&key).unwrap().name()
        );
    }

    #[test]
    fn concurrent_registration_keeps_latest_correct() {
        let tmp = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (1..=32)
            .map(|i| touch(tmp.path(), &format!("c_{i:03}.k")))
            .collect();
        let reg = Registry::new();

        thread::scope(|s| {
            for chunk in paths.chunks(4) {
                let reg = &reg;
                s.spawn(move || {
                    for p in chunk {
                        let f = reg.get_or_create(p).unwrap();
                        let latest = reg.latest_of(f.family()).unwrap();
                        assert!(latest.version() >= f.version());
                    }
                });
            }
        });

        let key = reg.get_or_create(&paths[0]).unwrap().family().clone();
        assert_eq!(reg.family_len(&key), 32);
        assert_eq!(reg.latest_of(&key).unwrap().name(), "c_032.k");
    }

    #[test]
    fn families_do_not_cross_directories() {
        let tmp = TempDir::new().unwrap();
        let x = tmp.path().join("x");
        let y = tmp.path().join("y");
        fs::create_dir_all(&x).unwrap();
        fs::create_dir_all(&y).unwrap();
        let old = touch(&x, "part_003.k");
        touch(&x, "part_007.k");
        let far = touch(&y, "part_009.k");

        let reg = Registry::new();
        let other = reg.get_or_create(&far).unwrap();
        reg.scan_siblings(&other).unwrap();

        let file = reg.get_or_create(&old).unwrap();
        reg.scan_siblings(&file).unwrap();

        assert_eq!(file.family().key(), other.family().key());
        assert_ne!(file.family(), other.family());
        assert_eq!(reg.latest_of(file.family()).unwrap().name(), "part_007.k");
        assert_eq!(reg.latest_of(other.family()).unwrap().name(), "part_009.k");
    }
}
