//! Display order of the tracks
//!
//! ```text
//! [scheduler, if non-empty]
//! [gpu timelines]
//! [process lane (tid 0), if non-empty]
//! [threads with instrumented calls, most calls first]
//! [remaining threads with samples, most samples first]
//! ```
//!
//! Threads with neither calls nor samples are left out. Equal counts keep
//! ascending tid order so the layout does not flicker between reorders.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use crate::domain::Tid;

/// Rank threads: instrumented calls first, then sampled-only threads
///
/// The process lane is never ranked.
#[must_use]
pub fn sorted_thread_ids(thread_counts: &BTreeMap<Tid, u64>, event_counts: &BTreeMap<Tid, usize>) -> Vec<Tid> {
    let mut with_calls: Vec<(Tid, u64)> =
        thread_counts.iter().filter(|(tid, count)| !tid.is_process() && **count > 0).map(|(t, c)| (*t, *c)).collect();
    with_calls.sort_by_key(|(tid, count)| (Reverse(*count), *tid));

    let ranked: HashSet<Tid> = with_calls.iter().map(|(tid, _)| *tid).collect();
    let mut with_events: Vec<(Tid, usize)> = event_counts
        .iter()
        .filter(|(tid, count)| !tid.is_process() && **count > 0 && !ranked.contains(*tid))
        .map(|(t, c)| (*t, *c))
        .collect();
    with_events.sort_by_key(|(tid, count)| (Reverse(*count), *tid));

    with_calls.into_iter().map(|(tid, _)| tid).chain(with_events.into_iter().map(|(tid, _)| tid)).collect()
}

/// Keep threads whose name contains any of the space-separated tokens
///
/// An empty filter keeps everything.
pub fn filter_threads<F>(tids: Vec<Tid>, filter: &str, name_of: F) -> Vec<Tid>
where
    F: Fn(Tid) -> String,
{
    let tokens: Vec<&str> = filter.split_whitespace().collect();
    if tokens.is_empty() {
        return tids;
    }
    tids.into_iter()
        .filter(|tid| {
            let name = name_of(*tid);
            tokens.iter().any(|token| name.contains(token))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrumented_before_sampled() {
        let thread_counts = BTreeMap::from([(Tid(1), 10)]);
        let event_counts = BTreeMap::from([(Tid(2), 100), (Tid::PROCESS, 100)]);

        assert_eq!(sorted_thread_ids(&thread_counts, &event_counts), vec![Tid(1), Tid(2)]);
    }

    #[test]
    fn test_each_bucket_descending_with_tid_ties() {
        let thread_counts = BTreeMap::from([(Tid(5), 3), (Tid(3), 7), (Tid(4), 3), (Tid::PROCESS, 50)]);
        let event_counts = BTreeMap::from([(Tid(5), 1_000), (Tid(8), 2), (Tid(9), 20), (Tid(10), 0)]);

        let order = sorted_thread_ids(&thread_counts, &event_counts);
        assert_eq!(order, vec![Tid(3), Tid(4), Tid(5), Tid(9), Tid(8)]);
    }

    #[test]
    fn test_filter_tokens_are_ored() {
        let names = |tid: Tid| match tid.0 {
            1 => "render-main".to_string(),
            2 => "audio".to_string(),
            _ => "io-worker".to_string(),
        };
        let tids = vec![Tid(1), Tid(2), Tid(3)];

        assert_eq!(filter_threads(tids.clone(), "render io", names), vec![Tid(1), Tid(3)]);
        assert_eq!(filter_threads(tids.clone(), "   ", names), tids);
        assert!(filter_threads(tids, "gpu", names).is_empty());
    }
}
