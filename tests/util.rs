//! Shared test utilities for integration tests
//!
//! Builds small deck trees on disk so the `kup` binary can be driven
//! end to end without touching the developer's filesystem.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Deck that includes a stale part (a newer sibling exists) and a
/// material file found through a relative `*INCLUDE_PATH`.
///
/// ```text
/// run/main.k
/// run/part_003.k
/// run/part_007.k
/// lib/mat_1.k
/// ```
pub const MAIN_DECK: &str = "\
*KEYWORD
$ model assembly
*INCLUDE_PATH
../lib
*INCLUDE
part_003.k
*INCLUDE
mat_1.k
*END
";

pub fn make_deck_fixture() -> assert_fs::TempDir
{
    // Initialize the temporary project root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("run/main.k")
        .write_str(MAIN_DECK)
        .expect("write main deck");
    tmp.child("run/part_003.k")
        .write_str("*NODE\n")
        .expect("write part 3");
    tmp.child("run/part_007.k")
        .write_str("*NODE\n")
        .expect("write part 7");
    tmp.child("lib/mat_1.k")
        .write_str("*MAT_ELASTIC\n")
        .expect("write material");

    // Return the prepared directory to the caller
    tmp
}

/// Count non-overlapping occurrences of `needle` in `haystack`
pub fn count(
    haystack: &str,
    needle: &str,
) -> usize
{
    haystack
        .matches(needle)
        .count()
}
