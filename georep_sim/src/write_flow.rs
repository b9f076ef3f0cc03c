//! Write propagation: client → primary → fan-out replication.

use crate::events::{EventKind, EventLog};
use crate::schedule::{drain_due, leg_duration, Deferred, ACK_PAUSE_SECS};
use georep_core::LatLon;
use serde::Serialize;
use tracing::debug;

/// Phases of a write animation, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePhase {
    #[default]
    Idle,
    ToPrimary,
    PrimaryAck,
    Replicating,
    Complete,
}

/// Per-replica replication leg.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaStatus {
    pub region_id: String,
    pub progress: f64,
    pub latency_ms: u64,
    pub arrived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriteAction {
    BeginReplication,
}

/// Session state for one write-propagation run.
///
/// Latencies are snapshotted at [`start`](WriteFlow::start) and never
/// re-read; moving the client mid-run cancels back to `Idle` before the
/// new location is stored.
#[derive(Debug, Default)]
pub struct WriteFlow {
    client: Option<LatLon>,
    command: String,
    phase: WritePhase,
    primary_progress: f64,
    primary_latency_ms: u64,
    replicas: Vec<ReplicaStatus>,
    response: Option<String>,
    events: EventLog,
    elapsed: f64,
    pending: Vec<Deferred<WritePhase, WriteAction>>,
}

impl WriteFlow {
    pub fn new() -> Self {
        Self {
            command: "SET mykey \"hello\"".to_string(),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> WritePhase {
        self.phase
    }

    pub fn client_location(&self) -> Option<LatLon> {
        self.client
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn primary_progress(&self) -> f64 {
        self.primary_progress
    }

    pub fn primary_latency_ms(&self) -> u64 {
        self.primary_latency_ms
    }

    pub fn replicas(&self) -> &[ReplicaStatus] {
        &self.replicas
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    /// Stores a new client location, cancelling any run in progress first.
    pub fn set_client_location(&mut self, lat: f64, lon: f64) {
        if self.phase() != WritePhase::Idle {
            self.cancel_run();
        }
        self.client = Some(LatLon::new(lat, lon));
    }

    /// Begins a write animation with the given snapshotted latencies.
    /// Silent no-op without a client location.
    pub fn start(&mut self, primary_latency_ms: u64, replicas: &[(String, u64)]) {
        if self.client.is_none() {
            return;
        }

        self.phase = WritePhase::ToPrimary;
        self.primary_progress = 0.0;
        self.primary_latency_ms = primary_latency_ms;
        self.replicas = replicas
            .iter()
            .map(|(region_id, latency_ms)| ReplicaStatus {
                region_id: region_id.clone(),
                progress: 0.0,
                latency_ms: *latency_ms,
                arrived: false,
            })
            .collect();
        self.response = None;
        self.events.clear();
        self.elapsed = 0.0;
        self.pending.clear();

        self.events
            .record(0, format!("{} sent from client", self.command), EventKind::Send);
        debug!(latency_ms = primary_latency_ms, replicas = replicas.len(), "write started");
    }

    /// Advances the animation by `delta` seconds.
    pub fn advance(&mut self, delta: f64) {
        if matches!(self.phase(), WritePhase::Idle | WritePhase::Complete) {
            return;
        }

        self.elapsed += delta;
        let phase = self.phase();
        for action in drain_due(&mut self.pending, self.elapsed, &phase) {
            self.apply(action);
        }

        match self.phase() {
            WritePhase::ToPrimary => {
                let duration = leg_duration(self.primary_latency_ms);
                self.primary_progress = (self.primary_progress + delta / duration).min(1.0);
                if self.primary_progress >= 1.0 {
                    self.on_primary_ack();
                }
            }
            WritePhase::Replicating => {
                for replica in &mut self.replicas {
                    if replica.arrived {
                        continue;
                    }
                    let duration = leg_duration(replica.latency_ms);
                    replica.progress = (replica.progress + delta / duration).min(1.0);
                    if replica.progress >= 1.0 {
                        replica.arrived = true;
                        self.events.record(
                            self.primary_latency_ms + replica.latency_ms,
                            format!(
                                "{} received data (+{}ms)",
                                replica.region_id, replica.latency_ms
                            ),
                            EventKind::Arrive,
                        );
                    }
                }

                if self.replicas.iter().all(|r| r.arrived) {
                    self.phase = WritePhase::Complete;
                    debug!("write complete");
                }
            }
            _ => {}
        }
    }

    /// Returns the session to `Idle`, keeping the client and command.
    pub fn reset(&mut self) {
        self.cancel_run();
    }

    fn on_primary_ack(&mut self) {
        self.phase = WritePhase::PrimaryAck;
        self.response = Some("OK".to_string());
        self.events
            .record(self.primary_latency_ms, "Primary confirmed: OK", EventKind::Ack);

        self.pending.push(Deferred {
            fire_at: self.elapsed + ACK_PAUSE_SECS,
            expect: WritePhase::PrimaryAck,
            action: WriteAction::BeginReplication,
        });
    }

    fn apply(&mut self, action: WriteAction) {
        match action {
            WriteAction::BeginReplication => {
                self.phase = WritePhase::Replicating;
                let count = self.replicas.len();
                self.events.record(
                    self.primary_latency_ms,
                    format!(
                        "Replication started to {} replica{}",
                        count,
                        if count != 1 { "s" } else { "" }
                    ),
                    EventKind::Replicate,
                );
            }
        }
    }

    fn cancel_run(&mut self) {
        self.phase = WritePhase::Idle;
        self.primary_progress = 0.0;
        self.primary_latency_ms = 0;
        self.replicas.clear();
        self.response = None;
        self.events.clear();
        self.elapsed = 0.0;
        self.pending.clear();
    }
}
