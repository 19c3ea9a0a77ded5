//! Identity redaction.
//!
//! Some tracked projects require specific contributor names or emails to
//! be anonymised before they are persisted or used for lookups. The list
//! of sensitive values is loaded from a plain text file, one entry per
//! line; matching is case-insensitive on the trimmed value.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

/// Replacement for redacted values.
pub const ANONYMOUS: &str = "Anonymous";

/// Replaces configured sensitive strings with [`ANONYMOUS`].
#[derive(Debug, Default)]
pub struct Redactor {
    hidden: HashSet<String>,
}

impl Redactor {
    /// A redactor that hides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the hidden-value list from `path`.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut hidden = HashSet::new();
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            hidden.insert(entry.to_lowercase());
        }
        Ok(Self { hidden })
    }

    /// Return `s` unchanged, or [`ANONYMOUS`] when it is on the hidden list.
    pub fn apply<'a>(&self, s: &'a str) -> &'a str {
        if self.hidden.is_empty() {
            return s;
        }
        if self.hidden.contains(&s.trim().to_lowercase()) {
            ANONYMOUS
        } else {
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor(entries: &[&str]) -> Redactor {
        Redactor {
            hidden: entries.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    #[test]
    fn empty_redactor_is_identity() {
        let r = Redactor::empty();
        assert_eq!(r.apply("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn hidden_values_become_anonymous() {
        let r = redactor(&["jane doe", "jane@example.com"]);
        assert_eq!(r.apply("Jane Doe"), ANONYMOUS);
        assert_eq!(r.apply("  JANE@EXAMPLE.COM "), ANONYMOUS);
        assert_eq!(r.apply("John Doe"), "John Doe");
    }
}
