//! Waiting-item queue.
//!
//! A pure FIFO of item ids. No I/O, no locking, no tracing: the manager
//! owns the only instance behind its registry lock and performs all side
//! effects itself.
//!
//! # Position Semantics
//!
//! Positions are 1-based and count only waiting items; the head of the
//! queue is position 1 regardless of how many transfers are active.

// Queue positions are always well under u32::MAX in practice
#![allow(clippy::cast_possible_truncation)]

use std::collections::VecDeque;

use mediafetch_core::ItemId;

/// FIFO of items waiting for a transfer slot.
///
/// This is a sync type with no internal locking; the caller is
/// responsible for synchronization.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    pending: VecDeque<ItemId>,
}

impl DownloadQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Number of waiting items.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if an id is waiting.
    pub fn contains(&self, id: ItemId) -> bool {
        self.pending.contains(&id)
    }

    /// Append at the tail and return the 1-based position.
    ///
    /// Re-pushing an id already in the queue moves it to the tail.
    pub fn push(&mut self, id: ItemId) -> u32 {
        self.pending.retain(|queued| *queued != id);
        self.pending.push_back(id);
        self.pending.len() as u32
    }

    /// Pop the head of the queue.
    pub fn pop(&mut self) -> Option<ItemId> {
        self.pending.pop_front()
    }

    /// Remove an id wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|queued| *queued != id);
        self.pending.len() < before
    }

    /// 1-based position of an id.
    pub fn position(&self, id: ItemId) -> Option<u32> {
        self.pending
            .iter()
            .position(|queued| *queued == id)
            .map(|idx| idx as u32 + 1)
    }

    /// Waiting ids with their positions, head first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, ItemId)> + '_ {
        self.pending
            .iter()
            .enumerate()
            .map(|(idx, id)| (idx as u32 + 1, *id))
    }

    /// Remove and return every waiting id, head first.
    pub fn drain(&mut self) -> Vec<ItemId> {
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ItemId {
        ItemId::new(raw)
    }

    #[test]
    fn test_push_reports_position() {
        let mut queue = DownloadQueue::new();
        assert_eq!(queue.push(id(1)), 1);
        assert_eq!(queue.push(id(2)), 2);
        assert_eq!(queue.push(id(3)), 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_pop_fifo() {
        let mut queue = DownloadQueue::new();
        queue.push(id(1));
        queue.push(id(2));
        queue.push(id(3));

        assert_eq!(queue.pop(), Some(id(1)));
        assert_eq!(queue.pop(), Some(id(2)));
        assert_eq!(queue.pop(), Some(id(3)));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_shifts_positions() {
        let mut queue = DownloadQueue::new();
        queue.push(id(1));
        queue.push(id(2));
        queue.push(id(3));

        assert!(queue.remove(id(2)));
        assert!(!queue.remove(id(2)));
        assert_eq!(queue.position(id(3)), Some(2));
        assert!(!queue.contains(id(2)));
    }

    #[test]
    fn test_repush_moves_to_tail() {
        let mut queue = DownloadQueue::new();
        queue.push(id(1));
        queue.push(id(2));

        assert_eq!(queue.push(id(1)), 2);
        assert_eq!(queue.pop(), Some(id(2)));
    }

    #[test]
    fn test_iter_and_drain() {
        let mut queue = DownloadQueue::new();
        queue.push(id(7));
        queue.push(id(8));

        let listed: Vec<_> = queue.iter().collect();
        assert_eq!(listed, vec![(1, id(7)), (2, id(8))]);

        assert_eq!(queue.drain(), vec![id(7), id(8)]);
        assert!(queue.is_empty());
    }
}
