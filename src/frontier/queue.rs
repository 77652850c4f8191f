use super::entry::FrontierEntry;
use std::collections::{BinaryHeap, HashSet};

/// Priority of entries inserted at the front (corrections, retries)
pub const FRONT_PRIORITY: u32 = 0;

/// Priority-ordered queue of URLs pending a visit
///
/// Each normalized key is queued at most once. The frontier knows nothing
/// about already-visited URLs; `CrawlState` combines it with the visited set.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    queued: HashSet<String>,
    next_seq: i64,
    front_seq: i64,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a URL under an already computed key
    ///
    /// Returns false if the key is already queued.
    pub fn push(&mut self, url: &str, key: String, depth: u32, priority: u32) -> bool {
        if self.queued.contains(&key) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.insert(url, key, depth, priority, seq);
        true
    }

    /// Queues a URL ahead of everything else
    ///
    /// A queued copy of the same key is replaced.
    pub fn push_front(&mut self, url: &str, key: String, depth: u32) {
        self.purge(&key);
        self.front_seq -= 1;
        let seq = self.front_seq;
        self.insert(url, key, depth, FRONT_PRIORITY, seq);
    }

    fn insert(&mut self, url: &str, key: String, depth: u32, priority: u32, seq: i64) {
        self.queued.insert(key.clone());
        self.heap.push(FrontierEntry {
            url: url.to_string(),
            key,
            depth,
            priority,
            seq,
        });
    }

    /// Removes and returns the highest-priority entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.heap.pop()?;
        self.queued.remove(&entry.key);
        Some(entry)
    }

    /// Returns the entry that `pop` would return
    pub fn peek(&self) -> Option<&FrontierEntry> {
        self.heap.peek()
    }

    /// Removes every queued entry with this key, returning how many were removed
    pub fn purge(&mut self, key: &str) -> usize {
        if !self.queued.remove(key) {
            return 0;
        }
        let before = self.heap.len();
        self.heap.retain(|entry| entry.key != key);
        before - self.heap.len()
    }

    /// Returns true if the key is queued
    pub fn contains(&self, key: &str) -> bool {
        self.queued.contains(key)
    }

    /// Returns the number of URLs in the frontier
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Iterates over queued entries in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.heap.iter()
    }
}
