use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Milliseconds on the caller-supplied timeline. The queue never reads a
/// clock; whoever owns it feeds time in, which keeps every schedule fully
/// deterministic under test.
pub type Millis = u64;

/// Handle for cancelling a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A scheduled entry that has come due.
#[derive(Debug, Clone, Copy)]
pub struct DueTimer<K> {
    pub id: TimerId,
    pub deadline: Millis,
    pub kind: K,
}

#[derive(Debug, Clone, Copy)]
struct Entry<K> {
    deadline: Millis,
    id: TimerId,
    kind: K,
}

// Ordering is (deadline, insertion order) so entries scheduled for the same
// instant fire FIFO. Identity is the unique id.
impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Entry<K> {}

impl<K> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.id.0).cmp(&(other.deadline, other.id.0))
    }
}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One-shot timer queue with cancellation. Periodic cadences are expressed by
/// rescheduling from the fired deadline.
#[derive(Debug)]
pub struct TimerQueue<K> {
    heap: BinaryHeap<Reverse<Entry<K>>>,
    cancelled: HashSet<TimerId>,
    next_id: u64,
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, deadline: Millis, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(Entry { deadline, id, kind }));
        id
    }

    /// Cancelling an entry that is no longer pending is a no-op.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Next entry with `deadline <= now`, skipping cancelled ones.
    pub fn pop_due(&mut self, now: Millis) -> Option<DueTimer<K>> {
        while let Some(Reverse(head)) = self.heap.peek() {
            if head.deadline > now {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            return Some(DueTimer {
                id: entry.id,
                deadline: entry.deadline,
                kind: entry.kind,
            });
        }
        None
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }

    /// Entries still scheduled to fire.
    pub fn pending(&self) -> usize {
        self.heap.len().saturating_sub(self.cancelled.len())
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut q = TimerQueue::new();
        q.schedule(300, "c");
        q.schedule(100, "a");
        q.schedule(200, "b");

        assert_eq!(q.pop_due(1000).unwrap().kind, "a");
        assert_eq!(q.pop_due(1000).unwrap().kind, "b");
        assert_eq!(q.pop_due(1000).unwrap().kind, "c");
        assert!(q.pop_due(1000).is_none());
    }

    #[test]
    fn same_deadline_fires_fifo() {
        let mut q = TimerQueue::new();
        q.schedule(100, "first");
        q.schedule(100, "second");
        q.schedule(100, "third");

        assert_eq!(q.pop_due(100).unwrap().kind, "first");
        assert_eq!(q.pop_due(100).unwrap().kind, "second");
        assert_eq!(q.pop_due(100).unwrap().kind, "third");
    }

    #[test]
    fn respects_now_boundary() {
        let mut q = TimerQueue::new();
        q.schedule(100, "x");

        assert!(q.pop_due(99).is_none());
        let due = q.pop_due(100).unwrap();
        assert_eq!(due.deadline, 100);
        assert_eq!(due.kind, "x");
    }

    #[test]
    fn cancelled_entries_never_fire() {
        let mut q = TimerQueue::new();
        let keep = q.schedule(100, "keep");
        let drop = q.schedule(50, "drop");
        q.cancel(drop);

        let due = q.pop_due(1000).unwrap();
        assert_eq!(due.id, keep);
        assert!(q.pop_due(1000).is_none());
    }

    #[test]
    fn pending_accounts_for_cancellations() {
        let mut q = TimerQueue::new();
        let a = q.schedule(10, ());
        q.schedule(20, ());
        assert_eq!(q.pending(), 2);

        q.cancel(a);
        assert_eq!(q.pending(), 1);

        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    fn rescheduling_from_fired_deadline_keeps_cadence() {
        let mut q = TimerQueue::new();
        q.schedule(100, ());

        let mut fired = vec![];
        while let Some(due) = q.pop_due(500) {
            fired.push(due.deadline);
            if due.deadline + 100 <= 500 {
                q.schedule(due.deadline + 100, ());
            }
        }
        assert_eq!(fired, vec![100, 200, 300, 400, 500]);
    }
}
