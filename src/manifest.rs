//! Repository manifests
//!
//! Two layouts are supported:
//!
//! - Positional manifests: a source list and a destination list, one entry per
//!   line, paired by position. An entry is `<locator> <branch>` or
//!   `<locator> branch <branch>`.
//! - A combined pair manifest: `<source entry> -> <destination entry>` per line,
//!   so a malformed line drops the whole pair instead of shifting the pairing.
//!
//! Blank lines and lines starting with `#` are ignored in both layouts.

use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ConfigError;

const COMMENT_MARKER: char = '#';
const PAIR_SEPARATOR: &str = "->";

/// A repository locator and the branch to use from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub locator: String,
    pub branch: String,
}

/// One unit of mirroring work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub source: RepoEntry,
    pub destination: RepoEntry,
    /// 1-based position in manifest order
    pub index: usize,
}

impl RepoEntry {
    pub fn new(locator: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            branch: branch.into(),
        }
    }

    /// Parse one entry. Returns `None` for anything that is not exactly
    /// `<locator> <branch>` or `<locator> branch <branch>`.
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [locator, branch] => Some(Self::new(*locator, *branch)),
            [locator, keyword, branch] if keyword.eq_ignore_ascii_case("branch") => {
                Some(Self::new(*locator, *branch))
            }
            _ => None,
        }
    }
}

impl fmt::Display for RepoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.locator, self.branch)
    }
}

/// Lines that carry content, with their 1-based line numbers
fn content_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
}

fn read_manifest(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::ManifestUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a positional manifest body. `origin` is only used in warnings.
pub fn parse_entries(content: &str, origin: &str) -> Vec<RepoEntry> {
    let mut entries = Vec::new();

    for (line_no, line) in content_lines(content) {
        match RepoEntry::parse(line) {
            Some(entry) => entries.push(entry),
            None => warn!(manifest = origin, line = line_no, "Skipping invalid line: {}", line),
        }
    }

    entries
}

/// Load a positional manifest from disk
pub fn load_entries(path: &Path) -> Result<Vec<RepoEntry>, ConfigError> {
    let content = read_manifest(path)?;
    let entries = parse_entries(&content, &path.display().to_string());
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Zip source and destination entries by position.
///
/// Fails before any work is planned when the lists differ in length.
pub fn pair_entries(
    sources: Vec<RepoEntry>,
    destinations: Vec<RepoEntry>,
) -> Result<Vec<SyncPair>, ConfigError> {
    if sources.len() != destinations.len() {
        return Err(ConfigError::PairCountMismatch {
            sources: sources.len(),
            destinations: destinations.len(),
        });
    }

    Ok(sources
        .into_iter()
        .zip(destinations)
        .enumerate()
        .map(|(i, (source, destination))| SyncPair {
            source,
            destination,
            index: i + 1,
        })
        .collect())
}

/// Parse a combined pair manifest body
pub fn parse_pairs(content: &str, origin: &str) -> Vec<SyncPair> {
    let mut pairs = Vec::new();

    for (line_no, line) in content_lines(content) {
        let parsed = line.split_once(PAIR_SEPARATOR).and_then(|(left, right)| {
            Some((RepoEntry::parse(left)?, RepoEntry::parse(right)?))
        });

        match parsed {
            Some((source, destination)) => pairs.push(SyncPair {
                source,
                destination,
                index: pairs.len() + 1,
            }),
            None => warn!(manifest = origin, line = line_no, "Skipping invalid pair line: {}", line),
        }
    }

    pairs
}

/// Load a combined pair manifest from disk
pub fn load_pairs(path: &Path) -> Result<Vec<SyncPair>, ConfigError> {
    let content = read_manifest(path)?;
    let pairs = parse_pairs(&content, &path.display().to_string());
    debug!("Loaded {} pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

/// Load positional source and destination manifests and pair them
pub fn load_positional(sources: &Path, destinations: &Path) -> Result<Vec<SyncPair>, ConfigError> {
    let source_entries = load_entries(sources)?;
    let destination_entries = load_entries(destinations)?;
    pair_entries(source_entries, destination_entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickcheck_macros::quickcheck;
    use tempfile::TempDir;

    #[test]
    fn test_parse_two_token_entry() {
        assert_eq!(
            RepoEntry::parse("https://x/a.git main"),
            Some(RepoEntry::new("https://x/a.git", "main"))
        );
    }

    #[test]
    fn test_parse_branch_keyword_entry() {
        assert_eq!(
            RepoEntry::parse("https://x/a.git branch dev"),
            Some(RepoEntry::new("https://x/a.git", "dev"))
        );
        assert_eq!(
            RepoEntry::parse("  org/a   BRANCH   release-1 "),
            Some(RepoEntry::new("org/a", "release-1"))
        );
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert_eq!(RepoEntry::parse("https://x/a.git"), None);
        assert_eq!(RepoEntry::parse("https://x/a.git tag v1"), None);
        assert_eq!(RepoEntry::parse("a branch b extra"), None);
        assert_eq!(RepoEntry::parse(""), None);
    }

    #[test]
    fn test_parse_entries_skips_blank_comment_and_invalid() {
        let content = "\
# sources
https://x/a.git main

   # indented comment
https://x/broken.git
https://x/b.git branch dev
";
        let entries = parse_entries(content, "test");
        assert_eq!(
            entries,
            vec![
                RepoEntry::new("https://x/a.git", "main"),
                RepoEntry::new("https://x/b.git", "dev"),
            ]
        );
    }

    #[test]
    fn test_pair_entries_preserves_order() {
        let pairs = pair_entries(
            vec![
                RepoEntry::new("https://x/a.git", "main"),
                RepoEntry::new("https://x/b.git", "dev"),
            ],
            vec![
                RepoEntry::new("org/a", "main2"),
                RepoEntry::new("org/b", "dev2"),
            ],
        )
        .unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index, 1);
        assert_eq!(pairs[0].source.locator, "https://x/a.git");
        assert_eq!(pairs[0].destination.branch, "main2");
        assert_eq!(pairs[1].index, 2);
        assert_eq!(pairs[1].destination.locator, "org/b");
    }

    #[test]
    fn test_skipped_line_causes_count_mismatch() {
        let sources = parse_entries("https://x/a.git\nhttps://x/b.git dev\n", "src");
        let destinations = parse_entries("org/a main2\norg/b dev2\n", "dst");

        assert_eq!(sources.len(), 1);
        assert_matches!(
            pair_entries(sources, destinations),
            Err(ConfigError::PairCountMismatch {
                sources: 1,
                destinations: 2
            })
        );
    }

    #[test]
    fn test_parse_pairs() {
        let content = "\
# combined
https://x/a.git main -> org/a main2
https://x/b.git -> org/b dev2
https://x/c.git branch dev -> org/c branch dev3
";
        let pairs = parse_pairs(content, "pairs");

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index, 1);
        assert_eq!(pairs[0].source, RepoEntry::new("https://x/a.git", "main"));
        assert_eq!(pairs[0].destination, RepoEntry::new("org/a", "main2"));
        // The malformed `b` line is dropped as a whole; `c` keeps a dense index
        assert_eq!(pairs[1].index, 2);
        assert_eq!(pairs[1].source, RepoEntry::new("https://x/c.git", "dev"));
        assert_eq!(pairs[1].destination, RepoEntry::new("org/c", "dev3"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let result = load_entries(Path::new("/nonexistent/repos/clone_repos.txt"));
        assert_matches!(result, Err(ConfigError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_load_positional_from_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sources = temp_dir.path().join("clone_repos.txt");
        let destinations = temp_dir.path().join("push_repos.txt");
        std::fs::write(&sources, "https://x/a.git main\n").unwrap();
        std::fs::write(&destinations, "org/a branch main2\n").unwrap();

        let pairs = load_positional(&sources, &destinations).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].destination, RepoEntry::new("org/a", "main2"));
    }

    #[quickcheck]
    fn prop_parsed_entries_are_complete(line: String) -> bool {
        match RepoEntry::parse(&line) {
            Some(entry) => {
                !entry.locator.is_empty()
                    && !entry.branch.is_empty()
                    && !entry.locator.contains(char::is_whitespace)
                    && !entry.branch.contains(char::is_whitespace)
            }
            None => true,
        }
    }

    #[quickcheck]
    fn prop_manifest_never_grows(lines: Vec<String>) -> bool {
        let content = lines.join("\n");
        parse_entries(&content, "prop").len() <= content.lines().count()
    }
}
