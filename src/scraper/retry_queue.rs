//! Bounded-retry FIFO work queue
//!
//! The queue hands out one [`WorkItem`] at a time; the caller attempts it and
//! reports a failure back with [`RetryQueue::record_failure`]. A failed item
//! goes to the tail, behind every item not yet tried, so a failing dependency
//! is hit again only after the rest of the queue has had a turn.

use std::collections::VecDeque;

/// Number of retries an item gets after its first failed attempt
pub const MAX_RETRIES: u32 = 3;

/// A payload plus the number of times it has been retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    pub payload: T,
    pub retries: u32,
}

impl<T> WorkItem<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            retries: 0,
        }
    }
}

/// What happened to an item after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pushed to the tail; `attempt` is the retry number it will run as
    Requeued { attempt: u32 },
    /// Budget exhausted; moved to the permanent-failure list
    Retired,
}

/// FIFO queue of work items with a fixed retry budget
#[derive(Debug)]
pub struct RetryQueue<T> {
    pending: VecDeque<WorkItem<T>>,
    failed: Vec<WorkItem<T>>,
}

impl<T> RetryQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            failed: Vec::new(),
        }
    }

    /// Adds a fresh item to the tail
    pub fn push(&mut self, payload: T) {
        self.pending.push_back(WorkItem::new(payload));
    }

    /// Takes the item at the head
    pub fn pop(&mut self) -> Option<WorkItem<T>> {
        self.pending.pop_front()
    }

    /// Records a failed attempt of an item taken with [`pop`](Self::pop)
    ///
    /// Under budget the retry counter is bumped and the item requeued at the
    /// tail. Once the counter has reached [`MAX_RETRIES`] the item is retired
    /// with its counter unchanged.
    pub fn record_failure(&mut self, mut item: WorkItem<T>) -> Disposition {
        if item.retries < MAX_RETRIES {
            item.retries += 1;
            let attempt = item.retries;
            self.pending.push_back(item);
            Disposition::Requeued { attempt }
        } else {
            self.failed.push(item);
            Disposition::Retired
        }
    }

    /// Items still waiting to be attempted
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Items retired so far, in retirement order
    pub fn failed(&self) -> &[WorkItem<T>] {
        &self.failed
    }

    /// Consumes the queue, returning the payloads of retired items
    pub fn into_failed(self) -> Vec<T> {
        self.failed.into_iter().map(|item| item.payload).collect()
    }
}

impl<T> Default for RetryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for RetryQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<T> Extend<T> for RetryQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.pending.extend(iter.into_iter().map(WorkItem::new));
    }
}
