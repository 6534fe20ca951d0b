//! Numeric multi-segment versions parsed out of filename fragments.
//!
//! `"3.12.1"` becomes `[3, 12, 1]`, `"007"` becomes `[7]`, and a fragment
//! without digits becomes `[0]`. Ordering is numeric per segment, so
//! `9 < 10` and `1.2 < 1.2.1`.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

/// Ordered sequence of non-negative integers; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    parts: SmallVec<[u64; 4]>,
}

impl Version {
    /// Parse every maximal digit run, left to right. Never fails.
    pub fn parse(fragment: &str) -> Self {
        let mut parts = SmallVec::new();
        let mut current: Option<u64> = None;

        for b in fragment.bytes() {
            if b.is_ascii_digit() {
                let d = u64::from(b - b'0');
                // Saturate instead of wrapping on absurdly long runs
                let next = current
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(d))
                    .unwrap_or(u64::MAX);
                current = Some(next);
            } else if let Some(n) = current.take() {
                parts.push(n);
            }
        }

        if let Some(n) = current {
            parts.push(n);
        }

        if parts.is_empty() {
            parts.push(0);
        }

        Self { parts }
    }

    /// Segments in order
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::parse("")
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // First differing segment decides
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        // Equal prefix: the shorter sequence sorts first
        self.parts.len().cmp(&other.parts.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digit_runs_in_order() {
        assert_eq!(Version::parse("3.12.1").parts(), &[3, 12, 1]);
        assert_eq!(Version::parse("007").parts(), &[7]);
        assert_eq!(Version::parse("v2-rc4").parts(), &[2, 4]);
    }

    #[test]
    fn no_digits_is_zero() {
        assert_eq!(Version::parse("mesh").parts(), &[0]);
        assert_eq!(Version::parse("").parts(), &[0]);
        assert_eq!(Version::default(), Version::parse("0"));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(Version::parse("9") < Version::parse("10"));
        assert!(Version::parse("1.2") < Version::parse("1.2.1"));
        assert_eq!(Version::parse("2.0"), Version::parse("2.0"));
        assert_eq!(
            Version::parse("2.0").cmp(&Version::parse("2.0")),
            Ordering::Equal
        );
        assert!(Version::parse("1.10") > Version::parse("1.9.9"));
    }

    #[test]
    fn leading_zeros_do_not_matter() {
        assert_eq!(Version::parse("010"), Version::parse("10"));
        assert!(Version::parse("002") < Version::parse("010"));
    }

    #[test]
    fn overflow_saturates() {
        let v = Version::parse("99999999999999999999999");
        assert_eq!(v.parts(), &[u64::MAX]);
    }

    #[test]
    fn display_joins_with_dots() {
        assert_eq!(Version::parse("a1_b02_c3").to_string(), "1.2.3");
    }
}
