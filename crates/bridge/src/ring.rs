//! Bounded ring of replayable protocol events.
//!
//! Only stream-of-record frames land here: session updates, permission
//! requests, auth-URL announcements, structured events, and user
//! prompts. The ring is ordered by timestamp; turn ids are
//! non-decreasing. Oldest entries are evicted first.

use std::collections::VecDeque;

use gb_domain::HiddenMode;
use gb_protocol::{Frame, ReplayQuery};

/// One stored event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub timestamp_ms: i64,
    pub turn: i64,
    pub hidden: HiddenMode,
    pub frame: Frame,
}

/// First-in-first-evicted deque with a fixed capacity.
#[derive(Debug)]
pub struct EventRing {
    entries: VecDeque<EventRecord>,
    capacity: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, record: EventRecord) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The oldest turn id still retained, if any.
    pub fn oldest_turn(&self) -> Option<i64> {
        self.entries.front().map(|r| r.turn)
    }

    /// Snapshot in stored (timestamp) order.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.entries.iter().cloned().collect()
    }

    /// Compute the replay slice for a connection query.
    ///
    /// Order of operations: time-window filters first (`since` and
    /// `before`, both exclusive), then the turn-count cap — `limit`
    /// keeps only entries belonging to the last `limit` distinct turn
    /// ids among what survived the window.
    pub fn replay_slice(&self, query: &ReplayQuery) -> Vec<EventRecord> {
        let mut kept: Vec<EventRecord> = self
            .entries
            .iter()
            .filter(|r| query.since.is_none_or(|since| r.timestamp_ms > since))
            .filter(|r| query.before.is_none_or(|before| r.timestamp_ms < before))
            .cloned()
            .collect();

        if let Some(limit) = query.limit {
            let mut turns: Vec<i64> = Vec::new();
            for record in &kept {
                if turns.last() != Some(&record.turn) && !turns.contains(&record.turn) {
                    turns.push(record.turn);
                }
            }
            let cutoff = turns.len().saturating_sub(limit);
            let wanted = &turns[cutoff..];
            kept.retain(|r| wanted.contains(&r.turn));
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(timestamp_ms: i64, turn: i64) -> EventRecord {
        EventRecord {
            timestamp_ms,
            turn,
            hidden: HiddenMode::None,
            frame: Frame::notification("session/update", json!({"t": timestamp_ms})),
        }
    }

    #[test]
    fn capacity_is_enforced() {
        let mut ring = EventRing::new(3);
        for i in 0..10 {
            ring.push(record(i, i));
        }
        assert_eq!(ring.len(), 3);
        let snapshot = ring.snapshot();
        assert_eq!(snapshot[0].timestamp_ms, 7);
        assert_eq!(snapshot[2].timestamp_ms, 9);
    }

    #[test]
    fn order_is_preserved_after_eviction() {
        let mut ring = EventRing::new(4);
        for i in 0..20 {
            ring.push(record(100 + i, i / 3));
        }
        let snapshot = ring.snapshot();
        for pair in snapshot.windows(2) {
            assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
            assert!(pair[0].turn <= pair[1].turn);
        }
    }

    #[test]
    fn empty_query_returns_whole_ring() {
        let mut ring = EventRing::new(10);
        for i in 0..5 {
            ring.push(record(i, 1));
        }
        let slice = ring.replay_slice(&ReplayQuery::default());
        assert_eq!(slice.len(), 5);
    }

    #[test]
    fn since_is_exclusive() {
        let mut ring = EventRing::new(10);
        for i in 0..5 {
            ring.push(record(i * 10, 1));
        }
        let slice = ring.replay_slice(&ReplayQuery {
            since: Some(20),
            ..Default::default()
        });
        let stamps: Vec<i64> = slice.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![30, 40]);
    }

    #[test]
    fn before_is_exclusive() {
        let mut ring = EventRing::new(10);
        for i in 0..5 {
            ring.push(record(i * 10, 1));
        }
        let slice = ring.replay_slice(&ReplayQuery {
            before: Some(20),
            ..Default::default()
        });
        let stamps: Vec<i64> = slice.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 10]);
    }

    #[test]
    fn limit_counts_turns_not_frames() {
        let mut ring = EventRing::new(20);
        // Turn 1: 3 frames, turn 2: 2 frames, turn 3: 4 frames.
        for i in 0..3 {
            ring.push(record(i, 1));
        }
        for i in 3..5 {
            ring.push(record(i, 2));
        }
        for i in 5..9 {
            ring.push(record(i, 3));
        }

        let slice = ring.replay_slice(&ReplayQuery {
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(slice.len(), 6);
        assert!(slice.iter().all(|r| r.turn == 2 || r.turn == 3));
        // Within-turn order preserved.
        let stamps: Vec<i64> = slice.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn limit_larger_than_turn_count_keeps_everything() {
        let mut ring = EventRing::new(10);
        ring.push(record(0, 1));
        ring.push(record(1, 2));
        let slice = ring.replay_slice(&ReplayQuery {
            limit: Some(50),
            ..Default::default()
        });
        assert_eq!(slice.len(), 2);
    }

    #[test]
    fn limit_applies_after_time_window() {
        let mut ring = EventRing::new(10);
        ring.push(record(0, 1));
        ring.push(record(10, 2));
        ring.push(record(20, 3));

        // Window drops turn 3; limit=1 then keeps only turn 2.
        let slice = ring.replay_slice(&ReplayQuery {
            limit: Some(1),
            before: Some(20),
            ..Default::default()
        });
        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].turn, 2);
    }

    #[test]
    fn limit_zero_returns_nothing() {
        let mut ring = EventRing::new(10);
        ring.push(record(0, 1));
        let slice = ring.replay_slice(&ReplayQuery {
            limit: Some(0),
            ..Default::default()
        });
        assert!(slice.is_empty());
    }

    #[test]
    fn clear_resets() {
        let mut ring = EventRing::new(10);
        ring.push(record(0, 1));
        assert!(!ring.is_empty());
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.oldest_turn(), None);
    }
}
