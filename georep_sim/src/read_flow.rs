//! Read routing: client → nearest replica → response.
//!
//! The outbound and return trips both use the nearest-region latency
//! (symmetric cost), so the total modeled time is twice the one-way
//! estimate while the visualization gets two distinct packets.

use crate::schedule::{drain_due, leg_duration, Deferred, ACK_PAUSE_SECS};
use georep_core::LatLon;
use serde::Serialize;
use tracing::debug;

/// Phases of a read animation, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPhase {
    #[default]
    Idle,
    Fetching,
    Arriving,
    Responding,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ReadAction {
    BeginResponding,
}

/// Session state for one read-routing run.
#[derive(Debug, Default)]
pub struct ReadFlow {
    client: Option<LatLon>,
    command: String,
    phase: ReadPhase,
    fetch_progress: f64,
    response_progress: f64,
    nearest_region_id: Option<String>,
    nearest_latency_ms: u64,
    primary_latency_ms: u64,
    response: Option<String>,
    elapsed: f64,
    pending: Vec<Deferred<ReadPhase, ReadAction>>,
}

impl ReadFlow {
    pub fn new() -> Self {
        Self {
            command: "GET mykey".to_string(),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> ReadPhase {
        self.phase
    }

    pub fn client_location(&self) -> Option<LatLon> {
        self.client
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn fetch_progress(&self) -> f64 {
        self.fetch_progress
    }

    pub fn response_progress(&self) -> f64 {
        self.response_progress
    }

    pub fn nearest_region_id(&self) -> Option<&str> {
        self.nearest_region_id.as_deref()
    }

    pub fn nearest_latency_ms(&self) -> u64 {
        self.nearest_latency_ms
    }

    /// Latency the read *would* have cost against the primary; kept for
    /// the comparison display.
    pub fn primary_latency_ms(&self) -> u64 {
        self.primary_latency_ms
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    /// Stores a new client location, cancelling any run in progress first.
    pub fn set_client_location(&mut self, lat: f64, lon: f64) {
        if self.phase != ReadPhase::Idle {
            self.cancel_run();
        }
        self.client = Some(LatLon::new(lat, lon));
    }

    /// Begins a read animation against the given nearest region. Silent
    /// no-op without a client location.
    pub fn start_read(
        &mut self,
        nearest_region_id: &str,
        nearest_latency_ms: u64,
        primary_latency_ms: u64,
    ) {
        if self.client.is_none() {
            return;
        }

        self.phase = ReadPhase::Fetching;
        self.fetch_progress = 0.0;
        self.response_progress = 0.0;
        self.nearest_region_id = Some(nearest_region_id.to_string());
        self.nearest_latency_ms = nearest_latency_ms;
        self.primary_latency_ms = primary_latency_ms;
        self.response = None;
        self.elapsed = 0.0;
        self.pending.clear();

        debug!(
            nearest = nearest_region_id,
            latency_ms = nearest_latency_ms,
            "read started"
        );
    }

    /// Advances the animation by `delta` seconds.
    pub fn advance(&mut self, delta: f64) {
        if matches!(self.phase, ReadPhase::Idle | ReadPhase::Complete) {
            return;
        }

        self.elapsed += delta;
        let phase = self.phase;
        for action in drain_due(&mut self.pending, self.elapsed, &phase) {
            self.apply(action);
        }

        let duration = leg_duration(self.nearest_latency_ms);
        match self.phase {
            ReadPhase::Fetching => {
                self.fetch_progress = (self.fetch_progress + delta / duration).min(1.0);
                if self.fetch_progress >= 1.0 {
                    self.on_data_fetched();
                }
            }
            ReadPhase::Responding => {
                self.response_progress = (self.response_progress + delta / duration).min(1.0);
                if self.response_progress >= 1.0 {
                    self.response = Some("\"hello\"".to_string());
                    self.phase = ReadPhase::Complete;
                    debug!("read complete");
                }
            }
            _ => {}
        }
    }

    /// Returns the session to `Idle`, keeping the client and command.
    pub fn reset(&mut self) {
        self.cancel_run();
    }

    fn on_data_fetched(&mut self) {
        self.phase = ReadPhase::Arriving;
        self.fetch_progress = 1.0;

        // Pause at the replica for the arrival flash, then send the
        // response back along the reversed path.
        self.pending.push(Deferred {
            fire_at: self.elapsed + ACK_PAUSE_SECS,
            expect: ReadPhase::Arriving,
            action: ReadAction::BeginResponding,
        });
    }

    fn apply(&mut self, action: ReadAction) {
        match action {
            ReadAction::BeginResponding => {
                self.phase = ReadPhase::Responding;
            }
        }
    }

    fn cancel_run(&mut self) {
        self.phase = ReadPhase::Idle;
        self.fetch_progress = 0.0;
        self.response_progress = 0.0;
        self.nearest_region_id = None;
        self.nearest_latency_ms = 0;
        self.primary_latency_ms = 0;
        self.response = None;
        self.elapsed = 0.0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until(flow: &mut ReadFlow, phase: ReadPhase, dt: f64, max_ticks: usize) {
        for _ in 0..max_ticks {
            if flow.phase() == phase {
                return;
            }
            flow.advance(dt);
        }
        panic!("never reached {:?}, stuck in {:?}", phase, flow.phase());
    }

    #[test]
    fn test_start_requires_client() {
        let mut flow = ReadFlow::new();
        flow.start_read("eu-west-1", 20, 90);
        assert_eq!(flow.phase(), ReadPhase::Idle);
    }

    #[test]
    fn test_full_read_cycle() {
        let mut flow = ReadFlow::new();
        flow.set_client_location(52.52, 13.405);
        flow.start_read("eu-central-1", 8, 95);

        run_until(&mut flow, ReadPhase::Arriving, 0.05, 100);
        assert_eq!(flow.fetch_progress(), 1.0);
        assert!(flow.response().is_none());

        run_until(&mut flow, ReadPhase::Responding, 0.05, 100);
        run_until(&mut flow, ReadPhase::Complete, 0.05, 100);
        assert_eq!(flow.response(), Some("\"hello\""));
        assert_eq!(flow.response_progress(), 1.0);
        assert_eq!(flow.nearest_region_id(), Some("eu-central-1"));
    }

    #[test]
    fn test_fetch_and_respond_use_same_latency() {
        // Both legs clamp to the 0.3 s floor for an 8 ms hop: the phase
        // lengths match tick-for-tick.
        let mut flow = ReadFlow::new();
        flow.set_client_location(52.52, 13.405);
        flow.start_read("eu-central-1", 8, 95);

        let mut fetch_ticks = 0;
        while flow.phase() == ReadPhase::Fetching {
            flow.advance(0.05);
            fetch_ticks += 1;
            assert!(fetch_ticks < 100);
        }

        run_until(&mut flow, ReadPhase::Responding, 0.05, 100);
        let mut respond_ticks = 0;
        while flow.phase() == ReadPhase::Responding {
            flow.advance(0.05);
            respond_ticks += 1;
            assert!(respond_ticks < 100);
        }

        assert_eq!(fetch_ticks, respond_ticks);
    }

    #[test]
    fn test_relocation_cancels_pending_response() {
        let mut flow = ReadFlow::new();
        flow.set_client_location(0.0, 0.0);
        flow.start_read("us-east-1", 10, 10);
        run_until(&mut flow, ReadPhase::Arriving, 0.05, 100);

        flow.set_client_location(1.0, 1.0);
        assert_eq!(flow.phase(), ReadPhase::Idle);

        for _ in 0..20 {
            flow.advance(0.1);
        }
        assert_eq!(flow.phase(), ReadPhase::Idle);
        assert!(flow.nearest_region_id().is_none());
    }
}
