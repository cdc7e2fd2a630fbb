//! Deadline priority queue.
//!
//! Records live in an arena (`slots`) and never move; the binary min-heap
//! (`heap`) holds `(deadline, slot)` pairs and every record remembers its
//! current heap index. Removing or re-keying an arbitrary record therefore
//! goes straight to its heap index instead of searching by value.

use tokio::time::Instant;

/// Stable handle to a queued record. Reused after the record is removed.
pub type SlotId = usize;

#[derive(Debug)]
struct Slot<T> {
    heap_pos: usize,
    value: T,
}

#[derive(Debug)]
pub struct DeadlineQueue<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<SlotId>,
    heap: Vec<(Instant, SlotId)>,
}

impl<T> Default for DeadlineQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeadlineQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            heap: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert `value` due at `deadline` and return its slot.
    pub fn push(&mut self, deadline: Instant, value: T) -> SlotId {
        let pos = self.heap.len();
        let slot = Slot {
            heap_pos: pos,
            value,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.heap.push((deadline, id));
        self.sift_up(pos);
        id
    }

    /// Earliest record without removing it.
    pub fn peek(&self) -> Option<(SlotId, Instant)> {
        self.heap.first().map(|&(deadline, id)| (id, deadline))
    }

    pub fn deadline(&self, id: SlotId) -> Option<Instant> {
        let pos = self.slot(id)?.heap_pos;
        self.heap.get(pos).map(|&(deadline, _)| deadline)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slot(id).map(|s| &s.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .map(|s| &mut s.value)
    }

    /// Remove the record in `id` from wherever it sits in the heap.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let pos = self.slot(id)?.heap_pos;
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        self.heap.pop();
        let slot = self.slots[id].take()?;
        self.free.push(id);
        // the record that was last now sits in `pos` and may be out of order
        // in either direction
        if pos < self.heap.len() {
            self.fix(pos);
        }
        Some(slot.value)
    }

    /// Move the record in `id` to a new deadline and restore heap order.
    pub fn reschedule(&mut self, id: SlotId, deadline: Instant) -> bool {
        let Some(pos) = self.slot(id).map(|s| s.heap_pos) else {
            return false;
        };
        self.heap[pos].0 = deadline;
        self.fix(pos);
        true
    }

    /// Records in heap order (not sorted), with their deadlines.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, Instant, &T)> + '_ {
        self.heap.iter().filter_map(move |&(deadline, id)| {
            self.slot(id).map(|s| (id, deadline, &s.value))
        })
    }

    fn slot(&self, id: SlotId) -> Option<&Slot<T>> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    fn fix(&mut self, pos: usize) {
        if !self.sift_up(pos) {
            self.sift_down(pos);
        }
    }

    /// Returns true if the element moved.
    fn sift_up(&mut self, mut pos: usize) -> bool {
        let start = pos;
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[pos].0 >= self.heap[parent].0 {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos != start
    }

    fn sift_down(&mut self, mut pos: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && self.heap[right].0 < self.heap[left].0 {
                right
            } else {
                left
            };
            if self.heap[child].0 >= self.heap[pos].0 {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.sync_pos(a);
        self.sync_pos(b);
    }

    fn sync_pos(&mut self, pos: usize) {
        let id = self.heap[pos].1;
        if let Some(Some(slot)) = self.slots.get_mut(id) {
            slot.heap_pos = pos;
        }
    }

    /// Heap order holds and every record's back-index matches its position.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let ordered = (1..self.heap.len()).all(|i| self.heap[(i - 1) / 2].0 <= self.heap[i].0);
        let indexed = self
            .heap
            .iter()
            .enumerate()
            .all(|(pos, &(_, id))| self.slot(id).is_some_and(|s| s.heap_pos == pos));
        let live = self.slots.iter().filter(|s| s.is_some()).count();
        ordered && indexed && live == self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    /// Deterministic pseudo-random sequence for shuffling operations.
    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *seed >> 33
    }

    #[test]
    fn peek_returns_earliest() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        q.push(at(base, 5), "five");
        q.push(at(base, 1), "one");
        q.push(at(base, 3), "three");
        let (id, deadline) = q.peek().unwrap();
        assert_eq!(deadline, at(base, 1));
        assert_eq!(q.get(id), Some(&"one"));
        assert!(q.is_consistent());
    }

    #[test]
    fn remove_middle_updates_moved_record() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        let ids: Vec<_> = (0..8).map(|i| q.push(at(base, i), i)).collect();

        assert_eq!(q.remove(ids[2]), Some(2));
        assert!(q.is_consistent());
        assert_eq!(q.len(), 7);
        // every survivor is still reachable by its own slot
        for (i, &id) in ids.iter().enumerate().filter(|(i, _)| *i != 2) {
            assert_eq!(q.get(id), Some(&(i as u64)));
            assert_eq!(q.deadline(id), Some(at(base, i as u64)));
        }
        assert_eq!(q.remove(ids[2]), None);
    }

    #[test]
    fn remove_last_and_only() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        let a = q.push(at(base, 1), 'a');
        assert_eq!(q.remove(a), Some('a'));
        assert!(q.is_empty());
        assert!(q.peek().is_none());
        assert!(q.is_consistent());
    }

    #[test]
    fn slots_are_reused() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        let a = q.push(at(base, 1), 'a');
        q.remove(a);
        let b = q.push(at(base, 2), 'b');
        assert_eq!(a, b);
        assert_eq!(q.get(b), Some(&'b'));
    }

    #[test]
    fn reschedule_moves_both_directions() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        let a = q.push(at(base, 1), 'a');
        let b = q.push(at(base, 2), 'b');
        let c = q.push(at(base, 3), 'c');

        assert!(q.reschedule(a, at(base, 10)));
        assert_eq!(q.peek().map(|(id, _)| id), Some(b));
        assert!(q.is_consistent());

        assert!(q.reschedule(c, at(base, 0)));
        assert_eq!(q.peek().map(|(id, _)| id), Some(c));
        assert!(q.is_consistent());

        q.remove(b);
        assert!(!q.reschedule(b, at(base, 4)));
    }

    #[test]
    fn random_operations_keep_invariants() {
        let base = Instant::now();
        let mut q = DeadlineQueue::new();
        let mut live: Vec<SlotId> = Vec::new();
        let mut seed = 42;

        for step in 0..2_000u64 {
            match lcg(&mut seed) % 3 {
                0 | 1 if live.len() < 64 => {
                    let secs = lcg(&mut seed) % 100;
                    live.push(q.push(at(base, secs), step));
                }
                0 => {
                    let idx = (lcg(&mut seed) as usize) % live.len();
                    let secs = lcg(&mut seed) % 100;
                    assert!(q.reschedule(live[idx], at(base, secs)));
                }
                _ if !live.is_empty() => {
                    let idx = (lcg(&mut seed) as usize) % live.len();
                    let id = live.swap_remove(idx);
                    assert!(q.remove(id).is_some());
                }
                _ => {}
            }
            assert!(q.is_consistent(), "invariant broken at step {step}");
            assert_eq!(q.len(), live.len());
        }

        // draining by peek yields non-decreasing deadlines
        let mut last = base;
        while let Some((id, deadline)) = q.peek() {
            assert!(deadline >= last);
            last = deadline;
            q.remove(id);
        }
    }
}
