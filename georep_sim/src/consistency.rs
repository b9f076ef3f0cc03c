//! The eventual-consistency race: a replication wave vs. a delayed read.
//!
//! The animation races two packets, but the reported outcome never
//! depends on frame timing: the instant either leg saturates, staleness
//! is decided once from the snapshotted millisecond values
//! (`read_delay + read_latency < replication_latency`). The same inputs
//! therefore produce the same verdict at any tick rate.

use crate::schedule::{
    drain_due, leg_duration, Deferred, ACK_PAUSE_SECS, ANIMATION_SPEED, RESULT_PAUSE_SECS,
};
use georep_core::LatLon;
use serde::Serialize;
use tracing::debug;

/// Largest accepted artificial read delay in milliseconds.
pub const MAX_READ_DELAY_MS: u64 = 200;

/// Default artificial read delay in milliseconds.
pub const DEFAULT_READ_DELAY_MS: u64 = 120;

/// Phases of a consistency-race run, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RacePhase {
    #[default]
    Idle,
    Writing,
    WriteAck,
    Racing,
    Result,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RaceAction {
    BeginRacing,
    StartRead,
    Settle,
}

/// Session state for one consistency-race run.
#[derive(Debug)]
pub struct ConsistencyRace {
    client: Option<LatLon>,
    phase: RacePhase,
    read_delay_ms: u64,

    write_progress: f64,
    replication_progress: f64,
    read_progress: f64,
    read_started: bool,

    primary_latency_ms: u64,
    replication_latency_ms: u64,
    read_latency_ms: u64,

    is_stale: Option<bool>,

    elapsed: f64,
    pending: Vec<Deferred<RacePhase, RaceAction>>,
}

impl Default for ConsistencyRace {
    fn default() -> Self {
        Self {
            client: None,
            phase: RacePhase::Idle,
            read_delay_ms: DEFAULT_READ_DELAY_MS,
            write_progress: 0.0,
            replication_progress: 0.0,
            read_progress: 0.0,
            read_started: false,
            primary_latency_ms: 0,
            replication_latency_ms: 0,
            read_latency_ms: 0,
            is_stale: None,
            elapsed: 0.0,
            pending: Vec::new(),
        }
    }
}

impl ConsistencyRace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn client_location(&self) -> Option<LatLon> {
        self.client
    }

    pub fn read_delay_ms(&self) -> u64 {
        self.read_delay_ms
    }

    pub fn write_progress(&self) -> f64 {
        self.write_progress
    }

    pub fn replication_progress(&self) -> f64 {
        self.replication_progress
    }

    pub fn read_progress(&self) -> f64 {
        self.read_progress
    }

    pub fn read_started(&self) -> bool {
        self.read_started
    }

    pub fn primary_latency_ms(&self) -> u64 {
        self.primary_latency_ms
    }

    pub fn replication_latency_ms(&self) -> u64 {
        self.replication_latency_ms
    }

    pub fn read_latency_ms(&self) -> u64 {
        self.read_latency_ms
    }

    /// `None` until the race resolves, then whether the read saw stale
    /// data.
    pub fn is_stale(&self) -> Option<bool> {
        self.is_stale
    }

    /// Sets the artificial wait between write-ack and the read request,
    /// clamped to `[0, 200]` ms.
    pub fn set_read_delay(&mut self, delay_ms: u64) {
        self.read_delay_ms = delay_ms.min(MAX_READ_DELAY_MS);
    }

    /// Stores a new client location, cancelling any run in progress first.
    pub fn set_client_location(&mut self, lat: f64, lon: f64) {
        if self.phase != RacePhase::Idle {
            self.cancel_run();
        }
        self.client = Some(LatLon::new(lat, lon));
    }

    /// Begins a race with the given snapshotted latencies. Silent no-op
    /// without a client location.
    pub fn start_race(
        &mut self,
        primary_latency_ms: u64,
        replication_latency_ms: u64,
        read_latency_ms: u64,
    ) {
        if self.client.is_none() {
            return;
        }

        self.phase = RacePhase::Writing;
        self.write_progress = 0.0;
        self.replication_progress = 0.0;
        self.read_progress = 0.0;
        self.read_started = false;
        self.primary_latency_ms = primary_latency_ms;
        self.replication_latency_ms = replication_latency_ms;
        self.read_latency_ms = read_latency_ms;
        self.is_stale = None;
        self.elapsed = 0.0;
        self.pending.clear();

        debug!(
            primary_latency_ms,
            replication_latency_ms, read_latency_ms, "race started"
        );
    }

    /// Advances the animation by `delta` seconds.
    pub fn advance(&mut self, delta: f64) {
        if matches!(self.phase, RacePhase::Idle | RacePhase::Complete) {
            return;
        }

        self.elapsed += delta;
        let phase = self.phase;
        for action in drain_due(&mut self.pending, self.elapsed, &phase) {
            self.apply(action);
        }

        match self.phase {
            RacePhase::Writing => {
                let duration = leg_duration(self.primary_latency_ms);
                self.write_progress = (self.write_progress + delta / duration).min(1.0);
                if self.write_progress >= 1.0 {
                    self.phase = RacePhase::WriteAck;
                    self.pending.push(Deferred {
                        fire_at: self.elapsed + ACK_PAUSE_SECS,
                        expect: RacePhase::WriteAck,
                        action: RaceAction::BeginRacing,
                    });
                }
            }
            RacePhase::Racing => {
                // The replication wave always progresses.
                let rep_duration = leg_duration(self.replication_latency_ms);
                self.replication_progress =
                    (self.replication_progress + delta / rep_duration).min(1.0);

                // The read packet progresses only after the delay.
                if self.read_started {
                    let read_duration = leg_duration(self.read_latency_ms);
                    self.read_progress = (self.read_progress + delta / read_duration).min(1.0);
                }

                let replication_arrived = self.replication_progress >= 1.0;
                let read_arrived = self.read_started && self.read_progress >= 1.0;
                if replication_arrived || read_arrived {
                    self.resolve();
                }
            }
            _ => {}
        }
    }

    /// Returns the session to `Idle`, keeping the client and read delay.
    pub fn reset(&mut self) {
        self.cancel_run();
        self.primary_latency_ms = 0;
        self.replication_latency_ms = 0;
        self.read_latency_ms = 0;
    }

    fn apply(&mut self, action: RaceAction) {
        match action {
            RaceAction::BeginRacing => {
                self.phase = RacePhase::Racing;

                // The client waits its configured delay before reading.
                let scaled_delay = self.read_delay_ms as f64 * ANIMATION_SPEED;
                self.pending.push(Deferred {
                    fire_at: self.elapsed + scaled_delay,
                    expect: RacePhase::Racing,
                    action: RaceAction::StartRead,
                });
            }
            RaceAction::StartRead => {
                if !self.read_started {
                    self.read_started = true;
                }
            }
            RaceAction::Settle => {
                self.phase = RacePhase::Complete;
            }
        }
    }

    /// Decides the outcome from the latency arithmetic, not the animation
    /// clock, so the verdict is frame-rate independent.
    fn resolve(&mut self) {
        let stale = self.read_delay_ms + self.read_latency_ms < self.replication_latency_ms;
        self.is_stale = Some(stale);
        self.phase = RacePhase::Result;
        debug!(stale, "race resolved");

        self.pending.push(Deferred {
            fire_at: self.elapsed + RESULT_PAUSE_SECS,
            expect: RacePhase::Result,
            action: RaceAction::Settle,
        });
    }

    fn cancel_run(&mut self) {
        self.phase = RacePhase::Idle;
        self.write_progress = 0.0;
        self.replication_progress = 0.0;
        self.read_progress = 0.0;
        self.read_started = false;
        self.is_stale = None;
        self.elapsed = 0.0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_race(read_delay_ms: u64, dt: f64) -> ConsistencyRace {
        let mut race = ConsistencyRace::new();
        race.set_client_location(40.7, -74.0);
        race.set_read_delay(read_delay_ms);
        race.start_race(80, 100, 40);

        for _ in 0..2000 {
            if race.phase() == RacePhase::Complete {
                break;
            }
            race.advance(dt);
        }
        race
    }

    #[test]
    fn test_short_delay_reads_stale() {
        // 50 + 40 < 100: the read beats the replication wave.
        let race = run_race(50, 0.05);
        assert_eq!(race.phase(), RacePhase::Complete);
        assert_eq!(race.is_stale(), Some(true));
    }

    #[test]
    fn test_long_delay_reads_fresh() {
        // 150 + 40 >= 100: replication lands first.
        let race = run_race(150, 0.05);
        assert_eq!(race.phase(), RacePhase::Complete);
        assert_eq!(race.is_stale(), Some(false));
    }

    #[test]
    fn test_outcome_is_frame_rate_independent() {
        for delay in [0, 50, 55, 60, 120, 200] {
            let fine = run_race(delay, 0.016);
            let coarse = run_race(delay, 0.25);
            assert_eq!(
                fine.is_stale(),
                coarse.is_stale(),
                "delay={} diverged across tick rates",
                delay
            );
        }
    }

    #[test]
    fn test_read_waits_for_delay() {
        let mut race = ConsistencyRace::new();
        race.set_client_location(40.7, -74.0);
        race.set_read_delay(200);
        race.start_race(80, 400, 40);

        // Reach the racing phase.
        while race.phase() != RacePhase::Racing {
            race.advance(0.05);
        }

        // 200 ms of delay scales to 0.6 s; the read must not have moved
        // halfway through the wait.
        for _ in 0..5 {
            race.advance(0.05);
        }
        assert!(!race.read_started());
        assert_eq!(race.read_progress(), 0.0);
        assert!(race.replication_progress() > 0.0);

        for _ in 0..8 {
            race.advance(0.05);
        }
        assert!(race.read_started());
    }

    #[test]
    fn test_read_delay_clamped() {
        let mut race = ConsistencyRace::new();
        race.set_read_delay(900);
        assert_eq!(race.read_delay_ms(), MAX_READ_DELAY_MS);
    }

    #[test]
    fn test_start_requires_client() {
        let mut race = ConsistencyRace::new();
        race.start_race(80, 100, 40);
        assert_eq!(race.phase(), RacePhase::Idle);
    }

    #[test]
    fn test_relocation_cancels_run() {
        let mut race = ConsistencyRace::new();
        race.set_client_location(0.0, 0.0);
        race.start_race(80, 100, 40);
        while race.phase() != RacePhase::Racing {
            race.advance(0.05);
        }

        race.set_client_location(10.0, 10.0);
        assert_eq!(race.phase(), RacePhase::Idle);
        assert_eq!(race.is_stale(), None);

        // Stale deferred entries (read start, result pause) must not fire.
        for _ in 0..40 {
            race.advance(0.1);
        }
        assert_eq!(race.phase(), RacePhase::Idle);
        assert!(!race.read_started());
    }
}
