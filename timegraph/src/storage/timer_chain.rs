//! Linked chain of timer blocks for one lane

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use timegraph_common::TimerRecord;

use super::timer_block::{TimerBlock, TIMER_BLOCK_CAPACITY};

/// Append-only, block-chunked storage of one lane's timers
///
/// Safe for one writer and many concurrent readers. Appends go through a
/// [`ChainCursor`]; whoever holds it is the writer. Readers walk the chain
/// from `head` and never lock.
#[derive(Debug)]
pub struct TimerChain {
    head: Arc<TimerBlock>,
    block_capacity: usize,
    num_blocks: AtomicUsize,
    num_items: AtomicU64,
    /// Bumped by `clear`, invalidating outstanding cursors
    generation: AtomicU64,
}

/// Write position of a chain's single writer
///
/// Lanes keep theirs in the track store, under its coarse lock.
#[derive(Debug)]
pub struct ChainCursor {
    tail: Arc<TimerBlock>,
    generation: u64,
}

impl Default for TimerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerChain {
    #[must_use]
    pub fn new() -> Self {
        Self::with_block_capacity(TIMER_BLOCK_CAPACITY)
    }

    /// Chain whose blocks hold `block_capacity` timers each
    #[must_use]
    pub fn with_block_capacity(block_capacity: usize) -> Self {
        let block_capacity = block_capacity.max(1);
        let head = Arc::new(TimerBlock::with_capacity(block_capacity));
        Self {
            head,
            block_capacity,
            num_blocks: AtomicUsize::new(1),
            num_items: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Cursor at the last block of the chain
    ///
    /// Only one cursor per chain may be used for appending at a time.
    #[must_use]
    pub fn cursor(&self) -> ChainCursor {
        let mut tail = &self.head;
        while let Some(next) = tail.next() {
            tail = next;
        }
        ChainCursor { tail: Arc::clone(tail), generation: self.generation.load(Ordering::Acquire) }
    }

    /// Append a timer to the open block, sealing it and linking a fresh
    /// block when full
    ///
    /// A cursor taken before the last `clear` is moved to the new head.
    pub fn append(&self, cursor: &mut ChainCursor, record: TimerRecord) {
        if cursor.generation != self.generation.load(Ordering::Acquire) {
            *cursor = self.cursor();
        }
        if let Err(record) = cursor.tail.push(record) {
            let block = Arc::new(TimerBlock::with_capacity(self.block_capacity));
            // A fresh block always has room
            let _ = block.push(record);
            cursor.tail.link(Arc::clone(&block));
            cursor.tail = block;
            self.num_blocks.fetch_add(1, Ordering::AcqRel);
        }
        self.num_items.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of published timers
    #[must_use]
    pub fn len(&self) -> u64 {
        self.num_items.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks.load(Ordering::Acquire)
    }

    /// Blocks in chain order
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks { next: Some(&self.head) }
    }

    /// All published timers in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &TimerRecord> + '_ {
        self.blocks().flat_map(TimerBlock::iter)
    }

    /// Timers overlapping `[min_tick, max_tick]`, in chain order
    ///
    /// Blocks whose cached range misses the query are skipped without
    /// scanning their entries.
    #[must_use]
    pub fn query(&self, min_tick: u64, max_tick: u64) -> Vec<TimerRecord> {
        self.blocks()
            .filter(|block| block.intersects(min_tick, max_tick))
            .flat_map(TimerBlock::iter)
            .filter(|timer| timer.overlaps(min_tick, max_tick))
            .copied()
            .collect()
    }

    /// Smallest start tick, recomputed from the block range caches
    #[must_use]
    pub fn min_tick(&self) -> Option<u64> {
        self.blocks().filter(|block| !block.is_empty()).map(TimerBlock::min_tick).min()
    }

    /// Largest end tick, recomputed from the block range caches
    #[must_use]
    pub fn max_tick(&self) -> Option<u64> {
        self.blocks().filter(|block| !block.is_empty()).map(TimerBlock::max_tick).max()
    }

    /// Best match for `distance` among timers in blocks overlapping
    /// `[min_tick, max_tick]`
    ///
    /// `distance` returns `None` to reject a timer. Equal distances are
    /// resolved by `(start, end, depth, function_address)`, so the answer
    /// does not depend on arrival order.
    pub fn find_nearest<F>(&self, min_tick: u64, max_tick: u64, mut distance: F) -> Option<TimerRecord>
    where
        F: FnMut(&TimerRecord) -> Option<u64>,
    {
        let mut best: Option<(u64, TimerRecord)> = None;
        for block in self.blocks().filter(|block| block.intersects(min_tick, max_tick)) {
            for timer in block.iter() {
                let Some(d) = distance(timer) else {
                    continue;
                };
                let better = match &best {
                    None => true,
                    Some((best_d, best_timer)) => (d, tie_key(timer)) < (*best_d, tie_key(best_timer)),
                };
                if better {
                    best = Some((d, *timer));
                }
            }
        }
        best.map(|(_, timer)| timer)
    }

    /// Drop every block
    ///
    /// Takes `&mut self`: no reader may be scanning while the chain resets.
    pub fn clear(&mut self) {
        let fresh = Arc::new(TimerBlock::with_capacity(self.block_capacity));
        let old = std::mem::replace(&mut self.head, fresh);
        unlink(old);
        self.num_blocks.store(1, Ordering::Release);
        self.num_items.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for TimerChain {
    fn drop(&mut self) {
        let head = std::mem::replace(&mut self.head, Arc::new(TimerBlock::with_capacity(1)));
        unlink(head);
    }
}

fn tie_key(timer: &TimerRecord) -> (u64, u64, u8, u64) {
    (timer.start, timer.end, timer.depth, timer.function_address)
}

/// Release a run of blocks one at a time instead of recursively
fn unlink(mut block: Arc<TimerBlock>) {
    loop {
        let next = Arc::get_mut(&mut block).and_then(TimerBlock::take_next);
        drop(block);
        match next {
            Some(next) => block = next,
            None => break,
        }
    }
}

/// Iterator over the blocks of a chain
pub struct Blocks<'a> {
    next: Option<&'a Arc<TimerBlock>>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = &'a TimerBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.next?;
        self.next = block.next();
        Some(block.as_ref())
    }
}
