//! Indexed binary min-heap keyed by absolute firing time.
//!
//! Entries are `(time, jump id)` ordered lexicographically, so equal times
//! break ties toward the smallest id. A position index maps jump id to heap
//! slot, giving O(1) reads and O(log M) key updates in either direction.
//! `f64::INFINITY` is an ordinary key.

use super::error::NrmError;

#[derive(Clone, Debug)]
pub struct IndexedPriorityQueue {
    heap: Vec<(f64, usize)>,
    pos: Vec<usize>,
}

impl IndexedPriorityQueue {
    /// Build a heap over `times`, one entry per jump id, in O(M).
    pub fn new(times: &[f64]) -> Self {
        let heap = times.iter().copied().enumerate().map(|(i, t)| (t, i)).collect();
        let pos = (0..times.len()).collect();
        let mut pq = Self { heap, pos };
        if pq.heap.len() > 1 {
            for idx in (0..pq.heap.len() / 2).rev() {
                pq.sift_down(idx);
            }
        }
        pq
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Smallest `(time, id)` entry, ties toward the smallest id.
    pub fn peek_min(&self) -> Option<(f64, usize)> {
        self.heap.first().copied()
    }

    /// Scheduled time of one jump, O(1).
    pub fn time_of(&self, id: usize) -> Result<f64, NrmError> {
        let slot = *self
            .pos
            .get(id)
            .ok_or(NrmError::HeapInvariantViolation { jump: id })?;
        Ok(self.heap[slot].0)
    }

    /// Re-key one jump and restore heap order, O(log M).
    pub fn update(&mut self, id: usize, new_time: f64) -> Result<(), NrmError> {
        let slot = *self
            .pos
            .get(id)
            .ok_or(NrmError::HeapInvariantViolation { jump: id })?;
        self.heap[slot].0 = new_time;
        let slot = self.sift_up(slot);
        self.sift_down(slot);
        Ok(())
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (time_a, id_a) = self.heap[a];
        let (time_b, id_b) = self.heap[b];
        time_a < time_b || (time_a == time_b && id_a < id_b)
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos[self.heap[a].1] = a;
        self.pos[self.heap[b].1] = b;
    }

    fn sift_up(&mut self, mut idx: usize) -> usize {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.swap_slots(idx, parent);
            idx = parent;
        }
        idx
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            if left >= self.heap.len() {
                break;
            }
            let mut smallest = idx;
            if self.less(left, smallest) {
                smallest = left;
            }
            let right = left + 1;
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap_slots(idx, smallest);
            idx = smallest;
        }
    }
}
