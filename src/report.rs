//! Result rendering
//!
//! - [`preview`]: a capped walk rendered as a short text report
//! - JSON records, one object per line
//! - `ls -l` style listing lines

use crate::error::Result;
use crate::remote::{DirectoryEntry, EntryType, RemoteSession};
use crate::walker::{traverse, TraversalOptions};
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Number of matches a preview collects
pub const PREVIEW_LIMIT: usize = 10;

const PREVIEW_NOTE: &str = "Since not all files are included in this preview, \
the selected error handling method might not always yield accurate results";

/// First few matches and denials under a root
#[derive(Debug, Clone, Default)]
pub struct Preview {
    pub found: Vec<DirectoryEntry>,
    pub denied: Vec<DirectoryEntry>,
}

/// Walk `root` with the match cap forced to [`PREVIEW_LIMIT`] and no downloads
pub fn preview<S: RemoteSession>(
    session: &S,
    root: &str,
    options: &TraversalOptions,
) -> Result<Preview> {
    let mut options = options.clone();
    options.max_matches = Some(PREVIEW_LIMIT);
    options.download = None;
    options.progress = None;

    let outcome = traverse(session, root, &options)?;
    Ok(Preview {
        found: outcome.matches,
        denied: outcome.denied,
    })
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "The Following {} entities were found:", self.found.len())?;
        writeln!(f)?;
        for entry in &self.found {
            writeln!(f, "- {}", entry.path)?;
        }
        if !self.denied.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "The following {} entities were found that the current user has no access to:",
                self.denied.len()
            )?;
            for entry in &self.denied {
                writeln!(f, "- {}", entry.path)?;
            }
        }
        writeln!(f)?;
        writeln!(f, " ## Note: ")?;
        write!(f, "{}", PREVIEW_NOTE)
    }
}

/// Why an entry appears in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Matched,
    Downloaded,
    Denied,
}

#[derive(Serialize)]
struct EntryRecord<'a> {
    #[serde(flatten)]
    entry: &'a DirectoryEntry,
    modified: Option<String>,
    status: RecordStatus,
}

/// Render one entry as a JSON object
pub fn json_record(entry: &DirectoryEntry, status: RecordStatus) -> serde_json::Result<String> {
    serde_json::to_string(&EntryRecord {
        entry,
        modified: entry.modified_at().map(|t| t.to_rfc3339()),
        status,
    })
}

/// Write entries as JSON lines
pub fn write_json_records<W: Write>(
    out: &mut W,
    entries: &[DirectoryEntry],
    status: RecordStatus,
) -> std::io::Result<()> {
    for entry in entries {
        let line = json_record(entry, status)?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Render one entry as an `ls -l` style line
pub fn listing_line(entry: &DirectoryEntry) -> String {
    let kind = match entry.kind {
        EntryType::Directory => 'd',
        EntryType::Symlink => 'l',
        EntryType::File => '-',
        EntryType::Other => '?',
    };
    let perms = entry
        .permissions()
        .map(|p| p.to_rwx())
        .unwrap_or_else(|| "?????????".to_string());
    let modified = entry
        .modified_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".repeat(16));

    format!(
        "{}{} {:>12} {} {}",
        kind, perms, entry.size, modified, entry.path
    )
}

/// Write entries as listing lines
pub fn write_listing<W: Write>(out: &mut W, entries: &[DirectoryEntry]) -> std::io::Result<()> {
    for entry in entries {
        writeln!(out, "{}", listing_line(entry))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryTree;
    use crate::walker::{ErrorPolicy, MATCH_ALL};

    fn file(path: &str) -> DirectoryEntry {
        let (parent, name) = path.rsplit_once('/').unwrap();
        DirectoryEntry::new(parent, name, EntryType::File)
    }

    #[test]
    fn test_preview_caps_at_ten() {
        let mut tree = MemoryTree::new();
        for i in 0..25 {
            tree = tree.file(&format!("/data/f{:02}", i), "x");
        }
        let options = TraversalOptions::builder(MATCH_ALL).build().unwrap();
        let preview = preview(&tree, "/data", &options).unwrap();
        assert_eq!(preview.found.len(), PREVIEW_LIMIT);
        assert!(preview.denied.is_empty());
    }

    #[test]
    fn test_preview_reports_denied() {
        let tree = MemoryTree::new()
            .file("/data/open/a", "")
            .dir("/data/closed")
            .deny_list("/data/closed");
        let options = TraversalOptions::builder(MATCH_ALL)
            .error_policy(ErrorPolicy::Warn)
            .build()
            .unwrap();
        let preview = preview(&tree, "/data", &options).unwrap();
        let text = preview.to_string();
        assert!(text.starts_with("The Following 1 entities were found:\n\n- /data/open/a\n"));
        assert!(text.contains(
            "The following 1 entities were found that the current user has no access to:\n- /data/closed"
        ));
        assert!(text.ends_with(PREVIEW_NOTE));
    }

    #[test]
    fn test_preview_text_without_denied() {
        let preview = Preview {
            found: vec![file("/a/b.txt")],
            denied: Vec::new(),
        };
        let text = preview.to_string();
        assert!(!text.contains("no access"));
        assert!(text.contains(" ## Note: \n"));
    }

    #[test]
    fn test_json_record() {
        let mut entry = file("/data/a.txt");
        entry.size = 42;
        entry.mtime = Some(0);
        let json = json_record(&entry, RecordStatus::Matched).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["path"], "/data/a.txt");
        assert_eq!(value["kind"], "file");
        assert_eq!(value["size"], 42);
        assert_eq!(value["status"], "matched");
        assert_eq!(value["modified"], "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_write_json_records() {
        let mut out = Vec::new();
        write_json_records(&mut out, &[file("/a"), file("/b")], RecordStatus::Denied).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"status\":\"denied\"")));
    }

    #[test]
    fn test_listing_line() {
        let mut entry = file("/data/a.txt");
        entry.mode = Some(0o100644);
        entry.size = 1024;
        entry.mtime = Some(0);
        assert_eq!(
            listing_line(&entry),
            "-rw-r--r--         1024 1970-01-01 00:00 /data/a.txt"
        );
    }
}
