//! Narrated timeline events recorded by the scenario sessions.

use serde::Serialize;

/// Category of a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Send,
    Ack,
    Replicate,
    Arrive,
    Failure,
    Detect,
    Election,
    Elected,
    Reconnect,
    Resume,
}

/// One narrated entry: simulated time in milliseconds plus a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub time_ms: u64,
    pub label: String,
    pub kind: EventKind,
}

/// Append-only, time-ordered event log owned by a session.
///
/// Entries are recorded with *simulated* timestamps (derived from the
/// latency values), not animation time, so the log renders as a timeline
/// without further processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<TimelineEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&mut self, time_ms: u64, label: impl Into<String>, kind: EventKind) {
        self.events.push(TimelineEvent {
            time_ms,
            label: label.into(),
            kind,
        });
    }

    /// All entries in insertion order.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every entry (session reset).
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_preserves_order() {
        let mut log = EventLog::new();
        log.record(0, "sent", EventKind::Send);
        log.record(70, "acked", EventKind::Ack);

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].kind, EventKind::Send);
        assert_eq!(log.events()[1].time_ms, 70);

        log.clear();
        assert!(log.is_empty());
    }
}
