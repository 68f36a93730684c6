//! In-memory remote tree
//!
//! A [`RemoteSession`] backed by a map of paths, with per-path listing and
//! read denials. Counts listing calls and opened channels so callers can
//! observe how a walk touched the tree.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::types::{join_remote_path, DirectoryEntry, EntryType};
use crate::remote::{RemoteChannel, RemoteSession};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed timestamp given to every node (2024-01-01T00:00:00Z)
const NODE_MTIME: i64 = 1_704_067_200;

#[derive(Debug, Clone)]
struct Node {
    kind: EntryType,
    mode: u32,
    children: Vec<String>,
    content: Vec<u8>,
    deny_list: bool,
    deny_read: bool,
    vanished: bool,
}

impl Node {
    fn dir() -> Self {
        Self {
            kind: EntryType::Directory,
            mode: 0o040755,
            children: Vec::new(),
            content: Vec::new(),
            deny_list: false,
            deny_read: false,
            vanished: false,
        }
    }

    fn file(content: Vec<u8>) -> Self {
        Self {
            kind: EntryType::File,
            mode: 0o100644,
            children: Vec::new(),
            content,
            deny_list: false,
            deny_read: false,
            vanished: false,
        }
    }

    fn symlink() -> Self {
        Self {
            kind: EntryType::Symlink,
            mode: 0o120777,
            ..Self::file(Vec::new())
        }
    }
}

/// Counters shared by the tree and all of its channels
#[derive(Debug, Default)]
struct Counters {
    list_calls: Arc<AtomicUsize>,
    channels_opened: AtomicUsize,
    listed: Mutex<Vec<String>>,
}

/// An in-memory directory tree
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: Arc<HashMap<String, Node>>,
    counters: Arc<Counters>,
    refuse_channels: bool,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Create a tree containing only the root directory `/`
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), Node::dir());
        Self {
            nodes: Arc::new(nodes),
            counters: Arc::new(Counters::default()),
            refuse_channels: false,
        }
    }

    /// Add a directory (and any missing ancestors)
    pub fn dir(mut self, path: &str) -> Self {
        self.insert(path, Node::dir());
        self
    }

    /// Add a file with the given contents (and any missing ancestors)
    pub fn file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, Node::file(content.into()));
        self
    }

    /// Add a symbolic link entry
    pub fn symlink(mut self, path: &str) -> Self {
        self.insert(path, Node::symlink());
        self
    }

    /// Make listing `path` fail with PermissionDenied
    pub fn deny_list(mut self, path: &str) -> Self {
        if let Some(node) = Arc::make_mut(&mut self.nodes).get_mut(&normalize(path)) {
            node.deny_list = true;
        }
        self
    }

    /// Make reading `path` fail with PermissionDenied
    pub fn deny_read(mut self, path: &str) -> Self {
        if let Some(node) = Arc::make_mut(&mut self.nodes).get_mut(&normalize(path)) {
            node.deny_read = true;
        }
        self
    }

    /// Keep `path` in its parent's listing but report it as missing
    ///
    /// Models an entry deleted between listing its parent and visiting it.
    pub fn vanished(mut self, path: &str) -> Self {
        if let Some(node) = Arc::make_mut(&mut self.nodes).get_mut(&normalize(path)) {
            node.vanished = true;
        }
        self
    }

    /// Make every `open_channel` call fail
    pub fn refuse_channels(mut self) -> Self {
        self.refuse_channels = true;
        self
    }

    /// Number of `list` calls made on any channel
    pub fn list_calls(&self) -> usize {
        self.counters.list_calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the listing counter
    pub fn list_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.counters.list_calls)
    }

    /// Number of channels opened
    pub fn channels_opened(&self) -> usize {
        self.counters.channels_opened.load(Ordering::SeqCst)
    }

    /// Paths passed to `list`, in call order
    pub fn listed_paths(&self) -> Vec<String> {
        self.counters.listed.lock().clone()
    }

    fn insert(&mut self, path: &str, node: Node) {
        let path = normalize(path);
        if path == "/" {
            return;
        }
        let nodes = Arc::make_mut(&mut self.nodes);

        // Create missing ancestors, linking each into its parent
        let mut parent = "/".to_string();
        let components: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        for (i, name) in components.iter().enumerate() {
            let current = join_remote_path(&parent, name);
            let is_last = i + 1 == components.len();
            if !nodes.contains_key(&current) {
                let child = if is_last { node.clone() } else { Node::dir() };
                nodes.insert(current.clone(), child);
                if let Some(p) = nodes.get_mut(&parent) {
                    p.children.push(name.to_string());
                }
            }
            parent = current;
        }
    }
}

impl RemoteSession for MemoryTree {
    type Channel = MemoryChannel;

    fn open_channel(&self) -> RemoteResult<MemoryChannel> {
        if self.refuse_channels {
            return Err(RemoteError::ChannelFailed("subsystem request refused".into()));
        }
        self.counters.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryChannel {
            nodes: Arc::clone(&self.nodes),
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Channel over a [`MemoryTree`]
pub struct MemoryChannel {
    nodes: Arc<HashMap<String, Node>>,
    counters: Arc<Counters>,
}

impl RemoteChannel for MemoryChannel {
    fn list(&mut self, path: &str) -> RemoteResult<Vec<DirectoryEntry>> {
        self.counters.list_calls.fetch_add(1, Ordering::SeqCst);
        self.counters.listed.lock().push(path.to_string());

        let key = normalize(path);
        let node = self
            .nodes
            .get(&key)
            .filter(|node| !node.vanished)
            .ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })?;
        if node.deny_list {
            return Err(RemoteError::PermissionDenied {
                path: path.to_string(),
            });
        }
        if !node.kind.is_dir() {
            return Err(RemoteError::Protocol {
                path: path.to_string(),
                message: "not a directory".into(),
            });
        }

        Ok(node
            .children
            .iter()
            .filter_map(|name| {
                let child = self.nodes.get(&join_remote_path(&key, name))?;
                Some(DirectoryEntry {
                    size: child.content.len() as u64,
                    uid: Some(1000),
                    gid: Some(1000),
                    mode: Some(child.mode),
                    atime: Some(NODE_MTIME),
                    mtime: Some(NODE_MTIME),
                    ..DirectoryEntry::new(path, name, child.kind)
                })
            })
            .collect())
    }

    fn get(&mut self, remote_path: &str, sink: &mut dyn Write) -> RemoteResult<u64> {
        let node = self
            .nodes
            .get(&normalize(remote_path))
            .filter(|node| !node.vanished)
            .ok_or_else(|| RemoteError::NotFound {
                path: remote_path.to_string(),
            })?;
        if node.deny_read {
            return Err(RemoteError::PermissionDenied {
                path: remote_path.to_string(),
            });
        }
        sink.write_all(&node.content).map_err(|e| RemoteError::Io {
            path: remote_path.to_string(),
            reason: format!("local write failed: {}", e),
        })?;
        Ok(node.content.len() as u64)
    }
}

/// Normalize a path to the tree's key form
fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
