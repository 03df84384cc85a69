// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-term memory: a bounded, ordered turn log per thread.

use std::collections::VecDeque;

use dashmap::DashMap;
use kindred_core::Role;

use crate::types::StmEntry;

/// Registry of per-thread turn logs.
///
/// Each log holds at most `capacity` entries; the oldest is evicted first.
pub struct ShortTermMemory {
    capacity: usize,
    threads: DashMap<String, VecDeque<StmEntry>>,
}

impl ShortTermMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            threads: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a turn. Blank text is ignored and `false` is returned.
    pub fn append(&self, thread_id: &str, role: Role, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let mut log = self.threads.entry(thread_id.to_string()).or_default();
        log.push_back(StmEntry::new(role, text));
        while log.len() > self.capacity {
            log.pop_front();
        }
        true
    }

    /// Copy of the thread's log, oldest first.
    pub fn read(&self, thread_id: &str) -> Vec<StmEntry> {
        self.threads
            .get(thread_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Copy of the newest `n` entries, oldest first.
    pub fn tail(&self, thread_id: &str, n: usize) -> Vec<StmEntry> {
        self.threads
            .get(thread_id)
            .map(|log| log.iter().skip(log.len().saturating_sub(n)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, thread_id: &str) -> usize {
        self.threads.get(thread_id).map_or(0, |log| log.len())
    }

    pub fn is_empty(&self, thread_id: &str) -> bool {
        self.len(thread_id) == 0
    }

    /// Drop a thread's log.
    pub fn forget(&self, thread_id: &str) {
        self.threads.remove(thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_entries_in_order() {
        let stm = ShortTermMemory::new(30);
        for i in 0..45 {
            stm.append("t", Role::User, &format!("msg {i}"));
        }
        let log = stm.read("t");
        assert_eq!(log.len(), 30);
        assert_eq!(log[0].text, "msg 15");
        assert_eq!(log[29].text, "msg 44");
    }

    #[test]
    fn blank_text_is_ignored() {
        let stm = ShortTermMemory::new(30);
        assert!(!stm.append("t", Role::User, "   \n"));
        assert!(!stm.append("t", Role::User, ""));
        assert!(stm.is_empty("t"));
    }

    #[test]
    fn read_returns_a_copy() {
        let stm = ShortTermMemory::new(30);
        stm.append("t", Role::User, "hello");
        let mut copy = stm.read("t");
        copy.clear();
        assert_eq!(stm.len("t"), 1);
    }

    #[test]
    fn threads_do_not_share_logs() {
        let stm = ShortTermMemory::new(30);
        stm.append("a", Role::User, "one");
        stm.append("b", Role::Assistant, "two");
        assert_eq!(stm.read("a").len(), 1);
        assert_eq!(stm.read("b")[0].role, Role::Assistant);
        stm.forget("a");
        assert!(stm.read("a").is_empty());
        assert_eq!(stm.len("b"), 1);
    }

    #[test]
    fn tail_returns_newest_entries() {
        let stm = ShortTermMemory::new(30);
        stm.append("t", Role::User, "q1");
        stm.append("t", Role::Assistant, "a1");
        stm.append("t", Role::User, "q2");
        let tail = stm.tail("t", 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "a1");
        assert_eq!(tail[1].text, "q2");
        assert_eq!(stm.tail("t", 10).len(), 3);
        assert!(stm.tail("missing", 2).is_empty());
    }
}
