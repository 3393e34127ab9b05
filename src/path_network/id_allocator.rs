// ===========================================================================
// Transient id allocator for split nodes and edges
// ===========================================================================
use crate::path_network::graph::NodeId;

pub const DEFAULT_TRANSIENT_ID_OFFSET: u64 = 100_000;

/// Monotonic counter handing out ids for nodes and edges created while a
/// waypoint is spliced into the graph. Never reset, so ids stay unique for the
/// lifetime of the graph even after the transient items are removed again.
#[derive(Debug, Clone)]
pub struct TransientIdAllocator {
    next_id: u64,
}

impl TransientIdAllocator {
    pub fn new(start: u64) -> Self {
        Self { next_id: start }
    }

    /// Start at `offset`, or just past `max_persistent_id` if the persistent
    /// graph already uses ids that high.
    pub fn above(offset: u64, max_persistent_id: Option<u64>) -> Self {
        let start = match max_persistent_id {
            Some(max) if max >= offset => max + 1,
            _ => offset,
        };
        Self::new(start)
    }

    pub fn next(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next split will receive.
    pub fn current(&self) -> u64 {
        self.next_id
    }
}

impl Default for TransientIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSIENT_ID_OFFSET)
    }
}
