//! Remote entry types
//!
//! These types represent filesystem entries returned from directory
//! listings and are what the walker accumulates into its result sets.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Type of remote filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Device, FIFO, socket, or mode bits not reported
    Other,
}

impl EntryType {
    /// Convert from Unix mode bits
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => EntryType::File,      // S_IFREG
            0o040000 => EntryType::Directory, // S_IFDIR
            0o120000 => EntryType::Symlink,   // S_IFLNK
            _ => EntryType::Other,
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }
}

/// File permissions (Unix mode bits without type)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(pub u32);

impl Permissions {
    /// Create from full mode (strips type bits)
    pub fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Render as `rwxr-xr-x`
    pub fn to_rwx(&self) -> String {
        const FLAGS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];
        FLAGS
            .iter()
            .map(|&(bit, c)| if self.0 & bit != 0 { c } else { '-' })
            .collect()
    }
}

/// A remote directory entry with its attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Entry name (not full path)
    pub name: String,

    /// Full remote path
    pub path: String,

    /// Entry type
    pub kind: EntryType,

    /// Size in bytes
    pub size: u64,

    /// Owner user ID
    pub uid: Option<u32>,

    /// Owner group ID
    pub gid: Option<u32>,

    /// File mode (type + permissions)
    pub mode: Option<u32>,

    /// Last access time (Unix timestamp)
    pub atime: Option<i64>,

    /// Last modification time (Unix timestamp)
    pub mtime: Option<i64>,
}

impl DirectoryEntry {
    /// Create an entry for `name` inside `parent` with no attributes
    pub fn new(parent: &str, name: &str, kind: EntryType) -> Self {
        Self {
            name: name.to_string(),
            path: join_remote_path(parent, name),
            kind,
            size: 0,
            uid: None,
            gid: None,
            mode: None,
            atime: None,
            mtime: None,
        }
    }

    /// Create a placeholder entry for a walk root
    ///
    /// Used when the root itself is denied, since no parent listing
    /// supplied its attributes.
    pub fn root(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Self {
            name: if name.is_empty() { path.to_string() } else { name.to_string() },
            path: path.to_string(),
            kind: EntryType::Directory,
            size: 0,
            uid: None,
            gid: None,
            mode: None,
            atime: None,
            mtime: None,
        }
    }

    /// Create an entry from a full remote path with no attributes
    pub fn from_path(path: &str, kind: EntryType) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Self::new("/", &trimmed[1..], kind),
            Some(pos) => Self::new(&trimmed[..pos], &trimmed[pos + 1..], kind),
            None => Self::new("", trimmed, kind),
        }
    }

    /// Check if this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Get permissions from mode
    pub fn permissions(&self) -> Option<Permissions> {
        self.mode.map(Permissions::from_mode)
    }

    /// Modification time as a UTC datetime
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.mtime.and_then(|t| DateTime::from_timestamp(t, 0))
    }

    /// Parent directory path
    pub fn parent_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(0) => "/",
            Some(pos) => &self.path[..pos],
            None => "",
        }
    }
}

/// Join a remote directory path and an entry name
///
/// Remote paths always use `/`, regardless of the local platform.
pub fn join_remote_path(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "." {
        name.to_string()
    } else if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_from_mode() {
        assert_eq!(EntryType::from_mode(0o100644), EntryType::File);
        assert_eq!(EntryType::from_mode(0o040755), EntryType::Directory);
        assert_eq!(EntryType::from_mode(0o120777), EntryType::Symlink);
        assert_eq!(EntryType::from_mode(0o010644), EntryType::Other);
    }

    #[test]
    fn test_permissions() {
        let perms = Permissions::from_mode(0o100754);
        assert_eq!(perms.0, 0o754);
        assert_eq!(perms.to_rwx(), "rwxr-xr--");
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/", "etc"), "/etc");
        assert_eq!(join_remote_path("/data", "a.txt"), "/data/a.txt");
        assert_eq!(join_remote_path("/data/", "a.txt"), "/data/a.txt");
        assert_eq!(join_remote_path("", "a.txt"), "a.txt");
        assert_eq!(join_remote_path(".", "a.txt"), "a.txt");
    }

    #[test]
    fn test_parent_path() {
        let entry = DirectoryEntry::new("/data/sub", "file.txt", EntryType::File);
        assert_eq!(entry.path, "/data/sub/file.txt");
        assert_eq!(entry.parent_path(), "/data/sub");

        let top = DirectoryEntry::new("/", "etc", EntryType::Directory);
        assert_eq!(top.parent_path(), "/");
    }

    #[test]
    fn test_from_path() {
        let entry = DirectoryEntry::from_path("/data/sub/a.txt", EntryType::File);
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.path, "/data/sub/a.txt");

        let top = DirectoryEntry::from_path("/a.txt", EntryType::File);
        assert_eq!(top.path, "/a.txt");
        assert_eq!(top.parent_path(), "/");

        let relative = DirectoryEntry::from_path("a.txt", EntryType::File);
        assert_eq!(relative.path, "a.txt");
    }

    #[test]
    fn test_root_entry() {
        let root = DirectoryEntry::root("/home/user/");
        assert_eq!(root.name, "user");
        assert!(root.is_dir());

        let slash = DirectoryEntry::root("/");
        assert_eq!(slash.name, "/");
    }

    #[test]
    fn test_modified_at() {
        let mut entry = DirectoryEntry::new("/", "a", EntryType::File);
        assert!(entry.modified_at().is_none());
        entry.mtime = Some(0);
        assert_eq!(
            entry.modified_at().map(|t| t.to_rfc3339()),
            Some("1970-01-01T00:00:00+00:00".to_string())
        );
    }
}
