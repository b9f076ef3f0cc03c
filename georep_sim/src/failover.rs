//! Primary failure, detection, leader election, and recovery.
//!
//! The election is in-region: the failed primary's standby takes over, so
//! the new primary keeps the failed region's id and no cross-region vote
//! arcs are generated. The pre-failure topology is snapshotted so
//! [`reset`](Failover::reset) can restore it exactly.

use crate::events::{EventKind, EventLog};
use crate::schedule::{drain_due, leg_duration, Deferred, ACK_PAUSE_SECS};
use georep_core::{DatabaseTopology, TopologySnapshot};
use serde::Serialize;
use tracing::debug;

/// Real-time window for the failure flash, in seconds.
const FLASH_DURATION: f64 = 0.5;

/// Real-time window for the arc-break dissolve, in seconds.
const ARC_BREAK_DURATION: f64 = 0.6;

/// Phases of a failover run, linear with no branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailoverPhase {
    #[default]
    Idle,
    Failure,
    Detecting,
    Electing,
    Elected,
    Recovering,
    Complete,
}

/// A cross-region election vote arc. Unused under the in-region
/// promotion policy but kept for a future multi-candidate election.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionVote {
    pub from_region_id: String,
    pub to_region_id: String,
    pub progress: f64,
}

/// A client write that was in flight when the primary died.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedRequest {
    pub id: String,
    pub command: String,
    pub client_lat: f64,
    pub client_lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FailoverAction {
    BeginRecovering,
}

/// Session state for one failover run.
#[derive(Debug, Default)]
pub struct Failover {
    phase: FailoverPhase,

    failed_region_id: Option<String>,
    new_primary_id: Option<String>,

    failure_flash_progress: f64,
    arc_break_progress: f64,
    detection_progress: f64,
    election_progress: f64,
    election_votes: Vec<ElectionVote>,
    recovery_progress: f64,
    draining_progress: f64,

    queued_requests: Vec<QueuedRequest>,
    request_queue_visible: bool,

    events: EventLog,
    downtime_ms: u64,

    detection_time_ms: u64,
    election_time_ms: u64,
    recovery_time_ms: u64,

    snapshot: Option<TopologySnapshot>,

    elapsed: f64,
    pending: Vec<Deferred<FailoverPhase, FailoverAction>>,
}

impl Failover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> FailoverPhase {
        self.phase
    }

    pub fn failed_region_id(&self) -> Option<&str> {
        self.failed_region_id.as_deref()
    }

    pub fn new_primary_id(&self) -> Option<&str> {
        self.new_primary_id.as_deref()
    }

    pub fn failure_flash_progress(&self) -> f64 {
        self.failure_flash_progress
    }

    pub fn arc_break_progress(&self) -> f64 {
        self.arc_break_progress
    }

    pub fn detection_progress(&self) -> f64 {
        self.detection_progress
    }

    pub fn election_progress(&self) -> f64 {
        self.election_progress
    }

    pub fn election_votes(&self) -> &[ElectionVote] {
        &self.election_votes
    }

    pub fn recovery_progress(&self) -> f64 {
        self.recovery_progress
    }

    pub fn draining_progress(&self) -> f64 {
        self.draining_progress
    }

    pub fn queued_requests(&self) -> &[QueuedRequest] {
        &self.queued_requests
    }

    pub fn request_queue_visible(&self) -> bool {
        self.request_queue_visible
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Simulated downtime accumulated so far, in milliseconds.
    /// Non-decreasing within a run; 2600 once the run completes.
    pub fn downtime_ms(&self) -> u64 {
        self.downtime_ms
    }

    /// Kills the current primary and starts the failover sequence.
    ///
    /// Requires a primary and at least one replica; otherwise the call is
    /// a silent no-op (the embedding UI disables the trigger instead).
    pub fn kill_primary(&mut self, topology: &DatabaseTopology) {
        let Some(primary) = topology.primary() else {
            return;
        };
        if topology.read_replicas().is_empty() {
            return;
        }

        // In-region promotion: a standby in the same region takes over,
        // so the new primary keeps the failed region's id and there are
        // no cross-region votes.
        let failed = primary.to_string();

        *self = Self {
            phase: FailoverPhase::Failure,
            failed_region_id: Some(failed.clone()),
            new_primary_id: Some(failed),
            election_votes: Vec::new(),
            queued_requests: vec![
                QueuedRequest {
                    id: "req-0".to_string(),
                    command: "SET user:1 \"online\"".to_string(),
                    client_lat: 40.7,
                    client_lon: -74.0,
                },
                QueuedRequest {
                    id: "req-1".to_string(),
                    command: "INCR counter".to_string(),
                    client_lat: 48.9,
                    client_lon: 2.35,
                },
                QueuedRequest {
                    id: "req-2".to_string(),
                    command: "SET status \"active\"".to_string(),
                    client_lat: 37.5,
                    client_lon: 127.0,
                },
            ],
            detection_time_ms: 800,
            election_time_ms: 1200,
            recovery_time_ms: 600,
            snapshot: Some(topology.snapshot()),
            ..Self::default()
        };

        self.events
            .record(0, "Primary node failed!", EventKind::Failure);
        debug!(region = self.failed_region_id.as_deref(), "primary killed");
    }

    /// Advances the animation by `delta` seconds.
    pub fn advance(&mut self, delta: f64) {
        if matches!(self.phase, FailoverPhase::Idle | FailoverPhase::Complete) {
            return;
        }

        self.elapsed += delta;
        let phase = self.phase;
        for action in drain_due(&mut self.pending, self.elapsed, &phase) {
            self.apply(action);
        }

        match self.phase {
            FailoverPhase::Failure => self.advance_failure(delta),
            FailoverPhase::Detecting => self.advance_detecting(delta),
            FailoverPhase::Electing => self.advance_electing(delta),
            FailoverPhase::Recovering => self.advance_recovering(delta),
            _ => {}
        }
    }

    /// Restores the pre-failure topology and reinitializes the session.
    pub fn reset(&mut self, topology: &mut DatabaseTopology) {
        if let Some(snapshot) = &self.snapshot {
            topology.restore(snapshot);
        }
        *self = Self::default();
    }

    fn advance_failure(&mut self, delta: f64) {
        // Fixed real-time windows; this phase frames the failure visually
        // and is not latency-scaled.
        self.failure_flash_progress =
            (self.failure_flash_progress + delta / FLASH_DURATION).min(1.0);
        self.arc_break_progress =
            (self.arc_break_progress + delta / ARC_BREAK_DURATION).min(1.0);

        if self.failure_flash_progress >= 1.0 {
            self.phase = FailoverPhase::Detecting;
            self.request_queue_visible = true;
            self.events
                .record(0, "Failure detected by health checks", EventKind::Detect);
            self.events.record(
                0,
                format!("{} write requests queued", self.queued_requests.len()),
                EventKind::Failure,
            );
            self.events
                .record(0, "Read replicas still serving reads", EventKind::Resume);
        }
    }

    fn advance_detecting(&mut self, delta: f64) {
        let duration = leg_duration(self.detection_time_ms);
        self.detection_progress = (self.detection_progress + delta / duration).min(1.0);
        self.downtime_ms = (self.detection_progress * self.detection_time_ms as f64).round() as u64;

        if self.detection_progress >= 1.0 {
            self.phase = FailoverPhase::Electing;
            self.events.record(
                self.detection_time_ms,
                "Leader election started",
                EventKind::Election,
            );
        }
    }

    fn advance_electing(&mut self, delta: f64) {
        let duration = leg_duration(self.election_time_ms);
        self.election_progress = (self.election_progress + delta / duration).min(1.0);

        // Vote pulses trail the phase at 70% of its rate.
        for vote in &mut self.election_votes {
            if vote.progress < 1.0 {
                vote.progress = (vote.progress + 0.7 * delta / duration).min(1.0);
            }
        }

        self.downtime_ms = self.detection_time_ms
            + (self.election_progress * self.election_time_ms as f64).round() as u64;

        if self.election_progress >= 1.0 {
            let elected_at = self.detection_time_ms + self.election_time_ms;
            self.events.record(
                elected_at,
                "Backup replica promoted to leader!",
                EventKind::Elected,
            );
            self.phase = FailoverPhase::Elected;

            // Pause for the promotion flash, then reconnect.
            self.pending.push(Deferred {
                fire_at: self.elapsed + ACK_PAUSE_SECS,
                expect: FailoverPhase::Elected,
                action: FailoverAction::BeginRecovering,
            });
        }
    }

    fn advance_recovering(&mut self, delta: f64) {
        let duration = leg_duration(self.recovery_time_ms);
        self.recovery_progress = (self.recovery_progress + delta / duration).min(1.0);

        // Queued writes drain slightly slower than the arcs redraw.
        self.draining_progress = (self.draining_progress + delta / (duration * 1.2)).min(1.0);

        self.downtime_ms = self.detection_time_ms
            + self.election_time_ms
            + (self.recovery_progress * self.recovery_time_ms as f64).round() as u64;

        if self.recovery_progress >= 1.0 && self.draining_progress >= 1.0 {
            self.phase = FailoverPhase::Complete;
            self.events
                .record(self.downtime_ms, "Cluster fully recovered", EventKind::Resume);
            debug!(downtime_ms = self.downtime_ms, "failover complete");
        }
    }

    fn apply(&mut self, action: FailoverAction) {
        match action {
            FailoverAction::BeginRecovering => {
                self.phase = FailoverPhase::Recovering;
                let reconnect_at = self.detection_time_ms + self.election_time_ms;
                self.events.record(
                    reconnect_at,
                    "Connections re-establishing",
                    EventKind::Reconnect,
                );
                self.events.record(
                    reconnect_at,
                    "Queued writes draining to new primary",
                    EventKind::Reconnect,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> DatabaseTopology {
        let mut topo = DatabaseTopology::new();
        topo.set_primary("us-east-1");
        topo.add_read_replica("eu-west-1");
        topo.add_read_replica("ap-southeast-1");
        topo
    }

    fn run_to_complete(failover: &mut Failover, dt: f64) {
        for _ in 0..4000 {
            if failover.phase() == FailoverPhase::Complete {
                return;
            }
            failover.advance(dt);
        }
        panic!("failover never completed, stuck in {:?}", failover.phase());
    }

    #[test]
    fn test_kill_requires_primary_and_replica() {
        let mut failover = Failover::new();

        failover.kill_primary(&DatabaseTopology::new());
        assert_eq!(failover.phase(), FailoverPhase::Idle);

        let mut primary_only = DatabaseTopology::new();
        primary_only.set_primary("us-east-1");
        failover.kill_primary(&primary_only);
        assert_eq!(failover.phase(), FailoverPhase::Idle);
    }

    #[test]
    fn test_in_region_promotion() {
        let topo = topology();
        let mut failover = Failover::new();
        failover.kill_primary(&topo);

        assert_eq!(failover.phase(), FailoverPhase::Failure);
        assert_eq!(failover.failed_region_id(), Some("us-east-1"));
        assert_eq!(failover.new_primary_id(), Some("us-east-1"));
        assert!(failover.election_votes().is_empty());
        assert_eq!(failover.queued_requests().len(), 3);
    }

    #[test]
    fn test_downtime_monotonic_and_total() {
        let topo = topology();
        let mut failover = Failover::new();
        failover.kill_primary(&topo);

        let mut last_downtime = 0;
        for _ in 0..4000 {
            if failover.phase() == FailoverPhase::Complete {
                break;
            }
            failover.advance(0.05);
            assert!(
                failover.downtime_ms() >= last_downtime,
                "downtime went backwards"
            );
            last_downtime = failover.downtime_ms();
        }

        assert_eq!(failover.phase(), FailoverPhase::Complete);
        assert_eq!(failover.downtime_ms(), 2600);
    }

    #[test]
    fn test_event_sequence() {
        let topo = topology();
        let mut failover = Failover::new();
        failover.kill_primary(&topo);
        run_to_complete(&mut failover, 0.05);

        let events = failover.events().events();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::Failure,
                EventKind::Detect,
                EventKind::Failure,
                EventKind::Resume,
                EventKind::Election,
                EventKind::Elected,
                EventKind::Reconnect,
                EventKind::Reconnect,
                EventKind::Resume,
            ]
        );

        // Simulated timestamps follow the fixed phase durations.
        assert_eq!(events[4].time_ms, 800);
        assert_eq!(events[5].time_ms, 2000);
        assert_eq!(events[8].time_ms, 2600);

        // Timestamps never decrease.
        for pair in events.windows(2) {
            assert!(pair[0].time_ms <= pair[1].time_ms);
        }
    }

    #[test]
    fn test_reset_restores_topology() {
        let mut topo = topology();
        let before = topo.snapshot();

        let mut failover = Failover::new();
        failover.kill_primary(&topo);
        run_to_complete(&mut failover, 0.05);

        // Mangle the topology the way an embedding UI might mid-scenario.
        topo.clear();
        topo.set_primary("sa-east-1");

        failover.reset(&mut topo);
        assert_eq!(topo.snapshot(), before);
        assert_eq!(failover.phase(), FailoverPhase::Idle);
        assert_eq!(failover.downtime_ms(), 0);
        assert!(failover.events().is_empty());
        assert!(failover.queued_requests().is_empty());
    }

    #[test]
    fn test_request_queue_visible_after_flash() {
        let topo = topology();
        let mut failover = Failover::new();
        failover.kill_primary(&topo);
        assert!(!failover.request_queue_visible());

        // Flash runs 0.5 s.
        for _ in 0..11 {
            failover.advance(0.05);
        }
        assert_eq!(failover.phase(), FailoverPhase::Detecting);
        assert!(failover.request_queue_visible());
    }
}
