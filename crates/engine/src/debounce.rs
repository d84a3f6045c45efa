//! Per-element trigger coalescing against the engine's logical clock.
//!
//! One coalescer per element id, created lazily on the first debounced
//! trigger and removed when it fires. Every call within the window restarts
//! the deadline, replaces the pending event with the latest one, and counts a
//! waiter; the fire dispatches once and its settlement is reported once per
//! accumulated waiter.

use std::collections::HashMap;

use crate::event::TriggerEvent;

#[derive(Debug)]
struct Coalescer {
    deadline: u64,
    pending: TriggerEvent,
    waiters: usize,
}

#[derive(Debug, Default)]
pub(crate) struct DebounceTable {
    entries: HashMap<String, Coalescer>,
}

impl DebounceTable {
    pub(crate) fn schedule(&mut self, element: &str, delay: u64, event: TriggerEvent, now: u64) {
        use std::collections::hash_map::Entry;
        let deadline = now + delay;
        match self.entries.entry(element.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.deadline = deadline;
                entry.pending = event;
                entry.waiters += 1;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Coalescer {
                    deadline,
                    pending: event,
                    waiters: 1,
                });
            }
        }
    }

    /// Elements whose deadline has passed, in deterministic fire order.
    pub(crate) fn due(&self, now: u64) -> Vec<String> {
        let mut due: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, c)| c.deadline <= now)
            .map(|(k, c)| (c.deadline, k.clone()))
            .collect();
        due.sort();
        due.into_iter().map(|(_, k)| k).collect()
    }

    /// Remove a fired entry, yielding the last event and the waiter count.
    pub(crate) fn take(&mut self, element: &str) -> Option<(TriggerEvent, usize)> {
        self.entries.remove(element).map(|c| (c.pending, c.waiters))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
