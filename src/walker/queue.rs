//! Work-stealing directory queue
//!
//! Directory tasks live in a global injector plus one FIFO deque per
//! worker. A worker pops its own deque first, then the injector, then
//! steals from its siblings.
//!
//! A pending counter tracks tasks that have been submitted but not yet
//! finished. Children are counted before their parent is finished, so the
//! counter only reaches zero once the whole tree has been processed. No
//! task ever waits on its children.

use crate::remote::DirectoryEntry;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};
use std::sync::atomic::{AtomicU64, Ordering};

/// A directory to list
#[derive(Debug, Clone)]
pub struct DirTask {
    /// The directory, as reported by its parent listing
    pub entry: DirectoryEntry,

    /// Depth from the walk root (0 = root)
    pub depth: u32,
}

impl DirTask {
    /// Create the root task
    pub fn root(path: &str) -> Self {
        Self {
            entry: DirectoryEntry::root(path),
            depth: 0,
        }
    }

    /// Create a task for a subdirectory of this one
    pub fn child(&self, entry: DirectoryEntry) -> Self {
        Self {
            entry,
            depth: self.depth + 1,
        }
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Queue state shared by all workers
pub struct WorkQueue<T> {
    injector: Injector<T>,
    stealers: Vec<Stealer<T>>,
    pending: AtomicU64,
}

impl<T> WorkQueue<T> {
    /// Create a queue for `workers` workers, returning their local deques
    pub fn new(workers: usize) -> (Self, Vec<DequeWorker<T>>) {
        let locals: Vec<DequeWorker<T>> = (0..workers).map(|_| DequeWorker::new_fifo()).collect();
        let stealers = locals.iter().map(DequeWorker::stealer).collect();
        let queue = Self {
            injector: Injector::new(),
            stealers,
            pending: AtomicU64::new(0),
        };
        (queue, locals)
    }

    /// Submit a task from outside any worker
    pub fn submit(&self, task: T) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.injector.push(task);
    }

    /// Number of submitted but unfinished tasks
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Check whether every submitted task has finished
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    /// Attach worker `id` to its local deque
    pub fn local(&self, id: usize, deque: DequeWorker<T>) -> LocalQueue<'_, T> {
        LocalQueue {
            id,
            deque,
            shared: self,
        }
    }

    fn steal_global(&self) -> Option<T> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    fn steal_from_siblings(&self, id: usize) -> Option<T> {
        for (i, stealer) in self.stealers.iter().enumerate() {
            if i == id {
                continue;
            }
            loop {
                match stealer.steal() {
                    Steal::Success(task) => return Some(task),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }
}

/// One worker's view of the queue
pub struct LocalQueue<'a, T> {
    id: usize,
    deque: DequeWorker<T>,
    shared: &'a WorkQueue<T>,
}

impl<T> LocalQueue<'_, T> {
    /// Next task: local deque, then injector, then siblings
    pub fn next(&self) -> Option<T> {
        self.deque
            .pop()
            .or_else(|| self.shared.steal_global())
            .or_else(|| self.shared.steal_from_siblings(self.id))
    }

    /// Push a child task onto this worker's deque
    pub fn push(&self, task: T) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        self.deque.push(task);
    }

    /// Mark a task taken from the queue as finished
    pub fn finish(&self) {
        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn is_drained(&self) -> bool {
        self.shared.is_drained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::EntryType;

    #[test]
    fn test_dir_task() {
        let root = DirTask::root("/data");
        assert!(root.is_root());
        assert_eq!(root.path(), "/data");

        let child = root.child(DirectoryEntry::new("/data", "sub", EntryType::Directory));
        assert!(!child.is_root());
        assert_eq!(child.depth, 1);
        assert_eq!(child.path(), "/data/sub");
    }

    #[test]
    fn test_pending_accounting() {
        let (queue, mut locals) = WorkQueue::new(1);
        queue.submit(1u32);
        assert_eq!(queue.pending(), 1);

        let local = queue.local(0, locals.remove(0));
        assert_eq!(local.next(), Some(1));
        local.push(2);
        local.push(3);
        local.finish();
        assert_eq!(queue.pending(), 2);

        assert_eq!(local.next(), Some(2));
        local.finish();
        assert_eq!(local.next(), Some(3));
        local.finish();
        assert!(local.next().is_none());
        assert!(local.is_drained());
    }

    #[test]
    fn test_steal_from_sibling() {
        let (queue, mut locals) = WorkQueue::new(2);
        let second = queue.local(1, locals.pop().unwrap());
        let first = queue.local(0, locals.pop().unwrap());

        first.push("a");
        first.push("b");
        assert_eq!(second.next(), Some("a"));
        assert_eq!(first.next(), Some("b"));
        assert_eq!(queue.pending(), 2);
    }
}
