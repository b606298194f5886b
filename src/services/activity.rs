use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::protocol::dispatcher::truncate;

/// Entries kept before the oldest is evicted
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 50;

/// Longest entry text kept, in characters
const ENTRY_MAX_CHARS: usize = 200;

/// One line of connection/protocol activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub kind: String,
    pub text: String,
}

/// Counters shown next to the activity entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub messages: u64,
    pub errors: u64,
    pub last_kind: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub connected: bool,
    pub ws_url: Option<String>,
}

/// Bounded diagnostic log of what went over the wire
#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
    stats: ActivityStats,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            stats: ActivityStats::default(),
        }
    }

    fn push(&mut self, kind: &str, text: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        let at = Utc::now();
        self.entries.push_back(ActivityEntry {
            at,
            kind: kind.to_string(),
            text: truncate(text, ENTRY_MAX_CHARS),
        });
        self.stats.last_update = Some(at);
    }

    /// Record an inbound message of the given kind
    pub fn record_message(&mut self, kind: &str, text: &str) {
        self.stats.messages += 1;
        self.stats.last_kind = Some(kind.to_string());
        self.push(kind, text);
    }

    pub fn record_error(&mut self, text: &str) {
        self.stats.errors += 1;
        self.push("error", text);
    }

    /// Connection-level note that does not count as a message
    pub fn note(&mut self, text: &str) {
        self.push("info", text);
    }

    pub fn set_connected(&mut self, url: Option<&str>) {
        self.stats.connected = url.is_some();
        if let Some(url) = url {
            self.stats.ws_url = Some(url.to_string());
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &ActivityStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = ActivityStats {
            connected: self.stats.connected,
            ws_url: self.stats.ws_url.clone(),
            ..ActivityStats::default()
        };
    }
}
