use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Ask a yes/no question on stderr and read the answer from stdin.
/// Anything but `y`/`yes` (including EOF) is a no.
pub fn confirm(question: &str) -> Result<bool>
{
    let mut err = io::stderr().lock();
    write!(err, "{question} [y/N] ").context("write prompt")?;
    err.flush().context("flush prompt")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("read answer from stdin")?;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool
{
    matches!(
        answer
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "y" | "yes"
    )
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn only_explicit_yes_counts()
    {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n\n"));
        assert!(!is_yes("yep"));
    }
}
