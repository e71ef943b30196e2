// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::{BTreeMap, HashMap};

use super::VictimSelector;
use crate::entry::Entry;

/// FIFO queue keyed by registration sequence.
///
/// Re-registering a path moves it to the back, so the front is always the
/// entry that was inserted or touched longest ago.
#[derive(Debug, Default)]
pub struct RecencyOrder {
    next_seq: u64,
    queue: BTreeMap<u64, String>,
    positions: HashMap<String, u64>,
}

impl VictimSelector for RecencyOrder {
    fn register(&mut self, entry: &Entry) {
        let path = entry.path();
        if let Some(old) = self.positions.remove(path) {
            self.queue.remove(&old);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert(seq, path.to_owned());
        self.positions.insert(path.to_owned(), seq);
    }

    fn unregister(&mut self, path: &str) -> bool {
        match self.positions.remove(path) {
            Some(seq) => {
                self.queue.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.queue.first_key_value().map(|(_, path)| path.as_str())
    }

    fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn paths(&self) -> Vec<&str> {
        self.queue.values().map(String::as_str).collect()
    }
}
