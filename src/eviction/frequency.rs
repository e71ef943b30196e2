// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use super::VictimSelector;
use crate::entry::Entry;

/// Ranking key; field order is comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    access_count: u64,
    size: Reverse<u64>,
    seq: u64,
}

/// Min-ordered index by access count.
///
/// Among equally frequent entries the larger one goes first, so a sweep
/// frees the most bytes for the same loss of hit potential. Remaining ties
/// fall back to registration order.
#[derive(Debug, Default)]
pub struct FrequencyOrder {
    next_seq: u64,
    ranked: BTreeMap<Rank, String>,
    ranks: HashMap<String, Rank>,
}

impl VictimSelector for FrequencyOrder {
    fn register(&mut self, entry: &Entry) {
        let path = entry.path();
        if let Some(old) = self.ranks.remove(path) {
            self.ranked.remove(&old);
        }
        let rank = Rank {
            access_count: entry.access_count(),
            size: Reverse(entry.size()),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.ranked.insert(rank, path.to_owned());
        self.ranks.insert(path.to_owned(), rank);
    }

    fn unregister(&mut self, path: &str) -> bool {
        match self.ranks.remove(path) {
            Some(rank) => {
                self.ranked.remove(&rank);
                true
            }
            None => false,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.ranked.first_key_value().map(|(_, path)| path.as_str())
    }

    fn contains(&self, path: &str) -> bool {
        self.ranks.contains_key(path)
    }

    fn len(&self) -> usize {
        self.ranked.len()
    }

    fn paths(&self) -> Vec<&str> {
        self.ranked.values().map(String::as_str).collect()
    }
}
