//! Min-first priority queue for ordering pending work

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    priority: u32,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap, so lower priority and earlier insertion
    // must compare as greater.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue popping the lowest priority first; ties pop in
/// insertion order.
pub struct PriorityQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, priority: u32, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority,
            seq,
            item,
        });
    }

    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.item)
    }

    pub fn peek_priority(&self) -> Option<u32> {
        self.heap.peek().map(|e| e.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain all items in pop order
    pub fn drain_ordered(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_lowest_priority_first() {
        let mut queue = PriorityQueue::new();
        queue.push(10, "ten");
        queue.push(1, "one");
        queue.push(5, "five");

        assert_eq!(queue.pop(), Some("one"));
        assert_eq!(queue.pop(), Some("five"));
        assert_eq!(queue.pop(), Some("ten"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut queue = PriorityQueue::new();
        queue.push(2, "a");
        queue.push(2, "b");
        queue.push(1, "c");
        queue.push(2, "d");

        assert_eq!(queue.peek_priority(), Some(1));
        assert_eq!(queue.drain_ordered(), vec!["c", "a", "b", "d"]);
        assert!(queue.is_empty());
    }
}
