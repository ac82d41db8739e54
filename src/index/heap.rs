//! Bounded top-k selection shared by coarse and fine search.

use std::collections::BinaryHeap;

/// Keeps the `capacity` smallest items seen so far under `T`'s order.
///
/// Items are pushed freely until the heap is full. After that a candidate
/// replaces the current worst only if it orders strictly before it, so the
/// retained set does not depend on the order candidates arrive in.
#[derive(Debug, Clone)]
pub struct BoundedMaxHeap<T: Ord> {
    heap: BinaryHeap<T>,
    capacity: usize,
}

impl<T: Ord> BoundedMaxHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The item that would be evicted next.
    pub fn worst(&self) -> Option<&T> {
        self.heap.peek()
    }

    /// Offer a candidate. Returns whether it was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.heap.len() < self.capacity {
            self.heap.push(item);
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut worst) if item < *worst => {
                *worst = item;
                true
            }
            _ => false,
        }
    }

    /// Offer every item of `other`.
    pub fn merge(&mut self, other: BoundedMaxHeap<T>) {
        for item in other.heap {
            self.push(item);
        }
    }

    /// Drain into a vector ordered best first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        self.heap.into_sorted_vec()
    }
}
