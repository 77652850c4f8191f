use std::cmp::Ordering;

/// A URL pending a visit
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// The URL to visit, as discovered
    pub url: String,

    /// Normalized deduplication key
    pub key: String,

    /// Discovery depth (start URL is 0)
    pub depth: u32,

    /// Priority value (lower is higher priority)
    pub priority: u32,

    /// Insertion sequence; breaks priority ties first-in first-out
    pub(crate) seq: i64,
}

// Lower priority values, then lower sequence numbers, are popped first from BinaryHeap
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}
