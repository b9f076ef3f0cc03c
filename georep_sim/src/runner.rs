//! Scenario runner - drives each learning scenario to completion.
//!
//! The runner owns the topology and a seeded RNG, snapshots run inputs
//! the way the interactive panels do (jittered latencies, nearest region
//! by stable latency), then ticks the session at a fixed rate until its
//! terminal phase. Given the same seed and configuration, a run produces
//! identical latencies, events, and outcome every time.

use crate::consistency::{ConsistencyRace, RacePhase};
use crate::events::TimelineEvent;
use crate::exporter::{LegProgress, SimExport, SimFrame};
use crate::failover::{Failover, FailoverPhase};
use crate::read_flow::{ReadFlow, ReadPhase};
use crate::scenarios::ScenarioId;
use crate::write_flow::{WriteFlow, WritePhase};

use georep_core::latency::{
    estimate_latency_between_regions_with, estimate_latency_with, nearest_region,
};
use georep_core::regions::region_by_id;
use georep_core::{DatabaseTopology, LatLon};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Replication latency substituted when a region pair cannot resolve.
const RACE_REPLICATION_FALLBACK_MS: u64 = 150;

/// Capture an export frame every this many ticks.
const FRAME_CAPTURE_INTERVAL: u64 = 10;

/// Scenario-specific outcome payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Write {
        primary_latency_ms: u64,
        replica_count: usize,
        response: Option<String>,
    },
    Read {
        nearest_region_id: String,
        nearest_latency_ms: u64,
        primary_latency_ms: u64,
        response: Option<String>,
    },
    Race {
        read_delay_ms: u64,
        primary_latency_ms: u64,
        replication_latency_ms: u64,
        read_latency_ms: u64,
        stale: Option<bool>,
    },
    Failover {
        failed_region_id: String,
        new_primary_id: String,
        downtime_ms: u64,
        topology_restored: bool,
    },
    /// Preconditions were not met; no session ran.
    Aborted,
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the run completed and satisfied its invariants
    pub passed: bool,

    /// Ticks executed
    pub total_ticks: u64,

    /// Animation time consumed, in seconds
    pub final_time_secs: f64,

    /// The session's narrated timeline
    pub events: Vec<TimelineEvent>,

    /// Scenario-specific payload
    pub outcome: ScenarioOutcome,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Anything the runner can tick and capture frames from.
trait Session {
    fn tick(&mut self, delta: f64);
    fn phase_label(&self) -> &'static str;
    fn is_terminal(&self) -> bool;
    fn legs(&self) -> Vec<LegProgress>;
}

impl Session for WriteFlow {
    fn tick(&mut self, delta: f64) {
        self.advance(delta);
    }

    fn phase_label(&self) -> &'static str {
        match self.phase() {
            WritePhase::Idle => "idle",
            WritePhase::ToPrimary => "to-primary",
            WritePhase::PrimaryAck => "primary-ack",
            WritePhase::Replicating => "replicating",
            WritePhase::Complete => "complete",
        }
    }

    fn is_terminal(&self) -> bool {
        self.phase() == WritePhase::Complete
    }

    fn legs(&self) -> Vec<LegProgress> {
        let mut legs = vec![LegProgress {
            label: "client→primary".to_string(),
            progress: self.primary_progress(),
        }];
        legs.extend(self.replicas().iter().map(|r| LegProgress {
            label: format!("primary→{}", r.region_id),
            progress: r.progress,
        }));
        legs
    }
}

impl Session for ReadFlow {
    fn tick(&mut self, delta: f64) {
        self.advance(delta);
    }

    fn phase_label(&self) -> &'static str {
        match self.phase() {
            ReadPhase::Idle => "idle",
            ReadPhase::Fetching => "fetching",
            ReadPhase::Arriving => "arriving",
            ReadPhase::Responding => "responding",
            ReadPhase::Complete => "complete",
        }
    }

    fn is_terminal(&self) -> bool {
        self.phase() == ReadPhase::Complete
    }

    fn legs(&self) -> Vec<LegProgress> {
        vec![
            LegProgress {
                label: "client→replica".to_string(),
                progress: self.fetch_progress(),
            },
            LegProgress {
                label: "replica→client".to_string(),
                progress: self.response_progress(),
            },
        ]
    }
}

impl Session for ConsistencyRace {
    fn tick(&mut self, delta: f64) {
        self.advance(delta);
    }

    fn phase_label(&self) -> &'static str {
        match self.phase() {
            RacePhase::Idle => "idle",
            RacePhase::Writing => "writing",
            RacePhase::WriteAck => "write-ack",
            RacePhase::Racing => "racing",
            RacePhase::Result => "result",
            RacePhase::Complete => "complete",
        }
    }

    fn is_terminal(&self) -> bool {
        self.phase() == RacePhase::Complete
    }

    fn legs(&self) -> Vec<LegProgress> {
        vec![
            LegProgress {
                label: "client→primary".to_string(),
                progress: self.write_progress(),
            },
            LegProgress {
                label: "primary→replica".to_string(),
                progress: self.replication_progress(),
            },
            LegProgress {
                label: "client→replica".to_string(),
                progress: self.read_progress(),
            },
        ]
    }
}

impl Session for Failover {
    fn tick(&mut self, delta: f64) {
        self.advance(delta);
    }

    fn phase_label(&self) -> &'static str {
        match self.phase() {
            FailoverPhase::Idle => "idle",
            FailoverPhase::Failure => "failure",
            FailoverPhase::Detecting => "detecting",
            FailoverPhase::Electing => "electing",
            FailoverPhase::Elected => "elected",
            FailoverPhase::Recovering => "recovering",
            FailoverPhase::Complete => "complete",
        }
    }

    fn is_terminal(&self) -> bool {
        self.phase() == FailoverPhase::Complete
    }

    fn legs(&self) -> Vec<LegProgress> {
        vec![
            LegProgress {
                label: "failure-flash".to_string(),
                progress: self.failure_flash_progress(),
            },
            LegProgress {
                label: "detection".to_string(),
                progress: self.detection_progress(),
            },
            LegProgress {
                label: "election".to_string(),
                progress: self.election_progress(),
            },
            LegProgress {
                label: "recovery".to_string(),
                progress: self.recovery_progress(),
            },
            LegProgress {
                label: "draining".to_string(),
                progress: self.draining_progress(),
            },
        ]
    }
}

/// Runs learning scenarios headlessly.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Safety cap on animation time per run, in seconds
    max_duration_secs: f64,

    /// Simulated client location
    client: LatLon,

    /// Artificial read delay for the consistency race
    read_delay_ms: u64,

    /// Topology every scenario reads
    topology: DatabaseTopology,
}

impl ScenarioRunner {
    /// Creates a runner with the default topology: primary in Virginia,
    /// replicas in Ireland and Singapore, client in Paris.
    pub fn new(seed: u64) -> Self {
        let mut topology = DatabaseTopology::new();
        topology.set_primary("us-east-1");
        topology.add_read_replica("eu-west-1");
        topology.add_read_replica("ap-southeast-1");

        Self {
            seed,
            tick_rate_hz: 60,
            max_duration_secs: 30.0,
            client: LatLon::new(48.9, 2.35),
            read_delay_ms: 120,
            topology,
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the per-run duration cap.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the simulated client location.
    pub fn with_client(mut self, client: LatLon) -> Self {
        self.client = client;
        self
    }

    /// Sets the consistency-race read delay.
    pub fn with_read_delay(mut self, delay_ms: u64) -> Self {
        self.read_delay_ms = delay_ms;
        self
    }

    /// Replaces the default topology.
    pub fn with_topology(mut self, topology: DatabaseTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn topology(&self) -> &DatabaseTopology {
        &self.topology
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_inner(scenario, None)
    }

    /// Runs a scenario while capturing frames for visualization.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.seed);
        let result = self.run_inner(scenario, Some(&mut export));
        export.finalize(result.passed, result.events.clone());
        (result, export)
    }

    fn run_inner(&self, scenario: ScenarioId, export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        match scenario {
            ScenarioId::WriteFlow => self.run_write(export),
            ScenarioId::ReadFlow => self.run_read(export),
            ScenarioId::ConsistencyRace => self.run_race(export),
            ScenarioId::Failover => self.run_failover(export),
        }
    }

    fn run_write(&self, export: Option<&mut SimExport>) -> ScenarioResult {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let Some(primary_id) = self.topology.primary() else {
            return self.aborted(ScenarioId::WriteFlow, "no primary region configured");
        };
        let Some(primary) = region_by_id(primary_id) else {
            return self.aborted(ScenarioId::WriteFlow, "primary region id is unknown");
        };

        let primary_latency = estimate_latency_with(
            &mut rng,
            self.client.lat,
            self.client.lon,
            primary.lat,
            primary.lon,
        );
        let replicas: Vec<(String, u64)> = self
            .topology
            .read_replicas()
            .iter()
            .filter_map(|id| {
                estimate_latency_between_regions_with(&mut rng, primary_id, id)
                    .map(|latency| (id.clone(), latency))
            })
            .collect();

        let mut session = WriteFlow::new();
        session.set_client_location(self.client.lat, self.client.lon);
        session.start(primary_latency, &replicas);

        let (ticks, time) = self.drive(&mut session, export);
        let passed = session.is_terminal();

        ScenarioResult {
            scenario: ScenarioId::WriteFlow,
            seed: self.seed,
            passed,
            total_ticks: ticks,
            final_time_secs: time,
            events: session.events().events().to_vec(),
            outcome: ScenarioOutcome::Write {
                primary_latency_ms: primary_latency,
                replica_count: replicas.len(),
                response: session.response().map(String::from),
            },
            failure_reason: (!passed).then(|| "run hit the duration cap".to_string()),
        }
    }

    fn run_read(&self, export: Option<&mut SimExport>) -> ScenarioResult {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let Some(primary_id) = self.topology.primary() else {
            return self.aborted(ScenarioId::ReadFlow, "no primary region configured");
        };
        let Some(primary) = region_by_id(primary_id) else {
            return self.aborted(ScenarioId::ReadFlow, "primary region id is unknown");
        };
        let Some((nearest, _)) = nearest_region(self.client, &self.topology.active_region_ids())
        else {
            return self.aborted(ScenarioId::ReadFlow, "no active region resolves");
        };

        let nearest_latency = estimate_latency_with(
            &mut rng,
            self.client.lat,
            self.client.lon,
            nearest.lat,
            nearest.lon,
        );
        let primary_latency = estimate_latency_with(
            &mut rng,
            self.client.lat,
            self.client.lon,
            primary.lat,
            primary.lon,
        );

        let mut session = ReadFlow::new();
        session.set_client_location(self.client.lat, self.client.lon);
        session.start_read(nearest.id, nearest_latency, primary_latency);

        let (ticks, time) = self.drive(&mut session, export);
        let passed = session.is_terminal() && session.response().is_some();

        ScenarioResult {
            scenario: ScenarioId::ReadFlow,
            seed: self.seed,
            passed,
            total_ticks: ticks,
            final_time_secs: time,
            events: Vec::new(),
            outcome: ScenarioOutcome::Read {
                nearest_region_id: nearest.id.to_string(),
                nearest_latency_ms: nearest_latency,
                primary_latency_ms: primary_latency,
                response: session.response().map(String::from),
            },
            failure_reason: (!passed).then(|| "run hit the duration cap".to_string()),
        }
    }

    fn run_race(&self, export: Option<&mut SimExport>) -> ScenarioResult {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let Some(primary_id) = self.topology.primary() else {
            return self.aborted(ScenarioId::ConsistencyRace, "no primary region configured");
        };
        let Some(primary) = region_by_id(primary_id) else {
            return self.aborted(ScenarioId::ConsistencyRace, "primary region id is unknown");
        };
        let Some((replica, _)) = nearest_region(self.client, &self.topology.active_region_ids())
        else {
            return self.aborted(ScenarioId::ConsistencyRace, "no active region resolves");
        };
        if replica.id == primary_id {
            return self.aborted(
                ScenarioId::ConsistencyRace,
                "nearest region is the primary; no replica to race",
            );
        }

        let primary_latency = estimate_latency_with(
            &mut rng,
            self.client.lat,
            self.client.lon,
            primary.lat,
            primary.lon,
        );
        let replication_latency =
            estimate_latency_between_regions_with(&mut rng, primary_id, replica.id)
                .unwrap_or(RACE_REPLICATION_FALLBACK_MS);
        let read_latency = estimate_latency_with(
            &mut rng,
            self.client.lat,
            self.client.lon,
            replica.lat,
            replica.lon,
        );

        let mut session = ConsistencyRace::new();
        session.set_client_location(self.client.lat, self.client.lon);
        session.set_read_delay(self.read_delay_ms);
        session.start_race(primary_latency, replication_latency, read_latency);

        let (ticks, time) = self.drive(&mut session, export);
        let passed = session.is_terminal() && session.is_stale().is_some();

        debug!(stale = ?session.is_stale(), "race finished");

        ScenarioResult {
            scenario: ScenarioId::ConsistencyRace,
            seed: self.seed,
            passed,
            total_ticks: ticks,
            final_time_secs: time,
            events: Vec::new(),
            outcome: ScenarioOutcome::Race {
                read_delay_ms: session.read_delay_ms(),
                primary_latency_ms: primary_latency,
                replication_latency_ms: replication_latency,
                read_latency_ms: read_latency,
                stale: session.is_stale(),
            },
            failure_reason: (!passed).then(|| "run hit the duration cap".to_string()),
        }
    }

    fn run_failover(&self, export: Option<&mut SimExport>) -> ScenarioResult {
        let mut topology = self.topology.clone();

        let mut session = Failover::new();
        session.kill_primary(&topology);
        if session.phase() == FailoverPhase::Idle {
            return self.aborted(
                ScenarioId::Failover,
                "failover needs a primary and at least one replica",
            );
        }

        let (ticks, time) = self.drive(&mut session, export);
        let completed = session.is_terminal();
        let downtime_ms = session.downtime_ms();
        let failed_region_id = session.failed_region_id().unwrap_or_default().to_string();
        let new_primary_id = session.new_primary_id().unwrap_or_default().to_string();
        let events = session.events().events().to_vec();

        session.reset(&mut topology);
        let topology_restored = topology == self.topology;

        let passed = completed && downtime_ms == 2600 && topology_restored;
        let failure_reason = if !completed {
            Some("run hit the duration cap".to_string())
        } else if downtime_ms != 2600 {
            Some(format!("downtime was {}ms, expected 2600ms", downtime_ms))
        } else if !topology_restored {
            Some("reset did not restore the pre-failure topology".to_string())
        } else {
            None
        };

        ScenarioResult {
            scenario: ScenarioId::Failover,
            seed: self.seed,
            passed,
            total_ticks: ticks,
            final_time_secs: time,
            events,
            outcome: ScenarioOutcome::Failover {
                failed_region_id,
                new_primary_id,
                downtime_ms,
                topology_restored,
            },
            failure_reason,
        }
    }

    /// Ticks a session until its terminal phase or the duration cap,
    /// capturing frames when an export is attached.
    fn drive(&self, session: &mut dyn Session, mut export: Option<&mut SimExport>) -> (u64, f64) {
        let dt = 1.0 / self.tick_rate_hz as f64;
        let max_ticks = (self.max_duration_secs * self.tick_rate_hz as f64).ceil() as u64;

        let mut ticks = 0;
        let mut time = 0.0;
        while ticks < max_ticks && !session.is_terminal() {
            session.tick(dt);
            ticks += 1;
            time += dt;

            if let Some(export) = export.as_mut() {
                if ticks % FRAME_CAPTURE_INTERVAL == 0 || session.is_terminal() {
                    export.add_frame(SimFrame {
                        time_sec: time,
                        phase: session.phase_label().to_string(),
                        legs: session.legs(),
                    });
                }
            }
        }

        (ticks, time)
    }

    fn aborted(&self, scenario: ScenarioId, reason: &str) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            events: Vec::new(),
            outcome: ScenarioOutcome::Aborted,
            failure_reason: Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass_with_defaults() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let a = ScenarioRunner::new(7).run(ScenarioId::ConsistencyRace);
        let b = ScenarioRunner::new(7).run(ScenarioId::ConsistencyRace);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.total_ticks, b.total_ticks);
    }

    #[test]
    fn test_race_outcome_follows_read_delay() {
        // Paris client, Ireland replica: replication from Virginia takes
        // ~70 ms, the local read ~12 ms. With no delay the read wins
        // (stale); with the maximum delay replication wins (fresh).
        let stale = ScenarioRunner::new(5)
            .with_read_delay(0)
            .run(ScenarioId::ConsistencyRace);
        match stale.outcome {
            ScenarioOutcome::Race { stale, .. } => assert_eq!(stale, Some(true)),
            other => panic!("unexpected outcome {:?}", other),
        }

        let fresh = ScenarioRunner::new(5)
            .with_read_delay(200)
            .run(ScenarioId::ConsistencyRace);
        match fresh.outcome {
            ScenarioOutcome::Race { stale, .. } => assert_eq!(stale, Some(false)),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_race_aborts_when_nearest_is_primary() {
        // A New York client's nearest region is the Virginia primary.
        let runner = ScenarioRunner::new(1).with_client(LatLon::new(40.7, -74.0));
        let result = runner.run(ScenarioId::ConsistencyRace);
        assert!(!result.passed);
        assert_eq!(result.outcome, ScenarioOutcome::Aborted);
    }

    #[test]
    fn test_read_routes_to_nearest_replica() {
        let result = ScenarioRunner::new(9).run(ScenarioId::ReadFlow);
        match result.outcome {
            ScenarioOutcome::Read {
                ref nearest_region_id,
                nearest_latency_ms,
                primary_latency_ms,
                ref response,
            } => {
                // Paris reads from Ireland, not Virginia.
                assert_eq!(nearest_region_id, "eu-west-1");
                assert!(nearest_latency_ms < primary_latency_ms);
                assert_eq!(response.as_deref(), Some("\"hello\""));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_write_requires_primary() {
        let runner = ScenarioRunner::new(1).with_topology(DatabaseTopology::new());
        let result = runner.run(ScenarioId::WriteFlow);
        assert!(!result.passed);
        assert_eq!(result.outcome, ScenarioOutcome::Aborted);
    }

    #[test]
    fn test_failover_requires_replicas() {
        let mut topo = DatabaseTopology::new();
        topo.set_primary("us-east-1");
        let runner = ScenarioRunner::new(1).with_topology(topo);
        let result = runner.run(ScenarioId::Failover);
        assert!(!result.passed);
        assert_eq!(result.outcome, ScenarioOutcome::Aborted);
    }

    #[test]
    fn test_export_captures_frames() {
        let runner = ScenarioRunner::new(42);
        let (result, export) = runner.run_with_export(ScenarioId::WriteFlow);
        assert!(result.passed);
        assert!(!export.frames.is_empty());
        assert!(export.passed);
        assert_eq!(export.events.len(), result.events.len());

        // The last frame is terminal.
        assert_eq!(export.frames.last().unwrap().phase, "complete");
    }
}
