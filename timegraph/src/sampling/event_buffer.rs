//! Per-thread buffer of sampled callstack events

use std::collections::BTreeMap;

use timegraph_common::{CallstackEvent, Tid};

/// Sample events keyed by thread and tick
///
/// Every event is stored twice: under its own thread and under the
/// process-aggregate key [`Tid::PROCESS`]. Within a thread the inner key is
/// `(tick, tid)` so samples of different threads taken at the same tick stay
/// distinct in the aggregate.
///
/// Not synchronized: the owning track store guards it with its scope lock.
#[derive(Debug, Default)]
pub struct EventBuffer {
    callstacks: BTreeMap<Tid, BTreeMap<(u64, Tid), CallstackEvent>>,
    min_time: Option<u64>,
    max_time: Option<u64>,
}

impl EventBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callstack_event(&mut self, event: CallstackEvent) {
        let key = (event.time, event.tid);
        self.callstacks.entry(event.tid).or_default().insert(key, event);
        if !event.tid.is_process() {
            self.callstacks.entry(Tid::PROCESS).or_default().insert(key, event);
        }

        self.min_time = Some(self.min_time.map_or(event.time, |t| t.min(event.time)));
        self.max_time = Some(self.max_time.map_or(event.time, |t| t.max(event.time)));
    }

    /// Events of `tid` with `t0 <= time <= t1`, in tick order
    ///
    /// `Tid::PROCESS` returns the events of every thread.
    #[must_use]
    pub fn callstack_events(&self, t0: u64, t1: u64, tid: Tid) -> Vec<CallstackEvent> {
        if t0 > t1 {
            return Vec::new();
        }
        self.callstacks
            .get(&tid)
            .map(|events| {
                events.range((t0, Tid(i32::MIN))..=(t1, Tid(i32::MAX))).map(|(_, e)| *e).collect()
            })
            .unwrap_or_default()
    }

    /// All events of `tid`, in tick order
    #[must_use]
    pub fn events_for_thread(&self, tid: Tid) -> Vec<CallstackEvent> {
        self.callstacks.get(&tid).map(|events| events.values().copied().collect()).unwrap_or_default()
    }

    /// Number of events per thread, aggregate key included
    #[must_use]
    pub fn event_counts(&self) -> BTreeMap<Tid, usize> {
        self.callstacks.iter().map(|(tid, events)| (*tid, events.len())).collect()
    }

    #[must_use]
    pub fn num_events(&self, tid: Tid) -> usize {
        self.callstacks.get(&tid).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn has_event(&self) -> bool {
        self.callstacks.values().any(|events| !events.is_empty())
    }

    #[must_use]
    pub fn min_time(&self) -> Option<u64> {
        self.min_time
    }

    #[must_use]
    pub fn max_time(&self) -> Option<u64> {
        self.max_time
    }

    pub fn reset(&mut self) {
        self.callstacks.clear();
        self.min_time = None;
        self.max_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timegraph_common::CallstackId;

    fn event(time: u64, tid: i32) -> CallstackEvent {
        CallstackEvent { time, tid: Tid(tid), callstack_id: CallstackId(7) }
    }

    #[test]
    fn test_events_mirrored_under_process_key() {
        let mut buffer = EventBuffer::new();
        buffer.add_callstack_event(event(10, 1));
        buffer.add_callstack_event(event(10, 2));
        buffer.add_callstack_event(event(20, 1));

        let counts = buffer.event_counts();
        assert_eq!(counts[&Tid(1)], 2);
        assert_eq!(counts[&Tid(2)], 1);
        assert_eq!(counts[&Tid::PROCESS], 3);
    }

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let mut buffer = EventBuffer::new();
        for time in [50, 10, 30, 40] {
            buffer.add_callstack_event(event(time, 3));
        }

        let times: Vec<u64> = buffer.callstack_events(10, 40, Tid(3)).iter().map(|e| e.time).collect();
        assert_eq!(times, vec![10, 30, 40]);
        assert!(buffer.callstack_events(60, 70, Tid(3)).is_empty());
        assert!(buffer.callstack_events(40, 10, Tid(3)).is_empty());
        assert!(buffer.callstack_events(0, 100, Tid(99)).is_empty());
    }

    #[test]
    fn test_min_max_and_reset() {
        let mut buffer = EventBuffer::new();
        assert!(!buffer.has_event());
        buffer.add_callstack_event(event(30, 1));
        buffer.add_callstack_event(event(5, 1));

        assert_eq!(buffer.min_time(), Some(5));
        assert_eq!(buffer.max_time(), Some(30));

        buffer.reset();
        assert!(!buffer.has_event());
        assert_eq!(buffer.min_time(), None);
        assert_eq!(buffer.num_events(Tid(1)), 0);
    }
}
