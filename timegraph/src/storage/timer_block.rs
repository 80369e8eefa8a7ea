//! Fixed-capacity, append-only block of timers

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use timegraph_common::TimerRecord;

/// Number of timers per block
pub const TIMER_BLOCK_CAPACITY: usize = 1024;

/// One block of a [`TimerChain`](super::TimerChain)
///
/// Slots are written once, in order, by the chain's writer. `len` is the
/// publication point: every slot below it is initialized and immutable.
#[derive(Debug)]
pub struct TimerBlock {
    slots: Box<[OnceLock<TimerRecord>]>,
    len: AtomicUsize,
    min_tick: AtomicU64,
    max_tick: AtomicU64,
    next: OnceLock<Arc<TimerBlock>>,
}

impl TimerBlock {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| OnceLock::new()).collect();
        Self {
            slots,
            len: AtomicUsize::new(0),
            min_tick: AtomicU64::new(u64::MAX),
            max_tick: AtomicU64::new(0),
            next: OnceLock::new(),
        }
    }

    /// Number of published timers
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// A full block is sealed: it will never be written again
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Smallest start tick in the block (`u64::MAX` when empty)
    #[must_use]
    pub fn min_tick(&self) -> u64 {
        self.min_tick.load(Ordering::Acquire)
    }

    /// Largest end tick in the block (`0` when empty)
    #[must_use]
    pub fn max_tick(&self) -> u64 {
        self.max_tick.load(Ordering::Acquire)
    }

    /// O(1) check whether any timer in the block may overlap `[min_tick, max_tick]`
    ///
    /// Never returns `false` for a block holding an overlapping timer.
    #[must_use]
    pub fn intersects(&self, min_tick: u64, max_tick: u64) -> bool {
        !self.is_empty() && self.min_tick() <= max_tick && self.max_tick() >= min_tick
    }

    /// Timer at `index`, if published
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TimerRecord> {
        if index < self.len() {
            self.slots[index].get()
        } else {
            None
        }
    }

    /// Published timers in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &TimerRecord> + '_ {
        let len = self.len();
        self.slots[..len].iter().filter_map(OnceLock::get)
    }

    /// Next block in the chain, once linked
    #[must_use]
    pub fn next(&self) -> Option<&Arc<TimerBlock>> {
        self.next.get()
    }

    /// Append a timer; hands it back if the block is full
    ///
    /// Only the chain writer calls this. The range cache is widened before
    /// the slot is published so a reader that observes the new length also
    /// observes a range covering it.
    pub(crate) fn push(&self, record: TimerRecord) -> Result<(), TimerRecord> {
        let index = self.len.load(Ordering::Relaxed);
        if index >= self.capacity() {
            return Err(record);
        }

        self.min_tick.fetch_min(record.start, Ordering::AcqRel);
        self.max_tick.fetch_max(record.end, Ordering::AcqRel);

        self.slots[index].set(record)?;
        self.len.store(index + 1, Ordering::Release);
        Ok(())
    }

    /// Link the successor block; a block is linked at most once
    pub(crate) fn link(&self, next: Arc<TimerBlock>) -> bool {
        self.next.set(next).is_ok()
    }

    /// Detach the successor so long chains drop iteratively
    pub(crate) fn take_next(&mut self) -> Option<Arc<TimerBlock>> {
        self.next.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(start: u64, end: u64) -> TimerRecord {
        TimerRecord { start, end, ..TimerRecord::default() }
    }

    #[test]
    fn test_push_until_full() {
        let block = TimerBlock::with_capacity(2);
        assert!(block.push(timer(1, 2)).is_ok());
        assert!(!block.is_sealed());
        assert!(block.push(timer(3, 4)).is_ok());
        assert!(block.is_sealed());

        let rejected = block.push(timer(5, 6));
        assert_eq!(rejected, Err(timer(5, 6)));
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_range_cache() {
        let block = TimerBlock::with_capacity(4);
        assert!(!block.intersects(0, u64::MAX));

        block.push(timer(50, 60)).unwrap();
        block.push(timer(10, 20)).unwrap();
        assert_eq!(block.min_tick(), 10);
        assert_eq!(block.max_tick(), 60);

        assert!(block.intersects(0, 10));
        assert!(block.intersects(60, 100));
        assert!(block.intersects(30, 40));
        assert!(!block.intersects(0, 9));
        assert!(!block.intersects(61, 100));
    }

    #[test]
    fn test_iter_follows_arrival_order() {
        let block = TimerBlock::with_capacity(4);
        block.push(timer(50, 60)).unwrap();
        block.push(timer(10, 20)).unwrap();

        let starts: Vec<u64> = block.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![50, 10]);
        assert_eq!(block.get(1).map(|t| t.start), Some(10));
        assert!(block.get(2).is_none());
    }
}
