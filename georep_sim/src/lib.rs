//! georep Simulation Engine
//!
//! Deterministic, tick-driven state machines behind a rotating-globe
//! visualization of distributed-database behavior: write replication,
//! nearest-region reads, eventual-consistency races, and failover.
//!
//! # Core Principle: External Clock
//!
//! Nothing in this crate touches wall-clock time. Every session exposes
//! `advance(delta_seconds)` and is driven by an external render loop (or
//! the headless [`ScenarioRunner`]). Fixed pauses between phases are data
//! in a pending queue, guarded by the phase they expect, so a reset or a
//! new run silently invalidates them.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                        │
//! │   topology + seeded RNG → snapshot latencies per run       │
//! └───────┬───────────┬──────────────┬──────────────┬──────────┘
//!         │           │              │              │
//!    ┌────▼────┐ ┌────▼────┐ ┌──────▼────────┐ ┌───▼──────┐
//!    │WriteFlow│ │ ReadFlow│ │ConsistencyRace│ │ Failover │
//!    └────┬────┘ └────┬────┘ └──────┬────────┘ └───┬──────┘
//!         │           │              │              │
//!         └───────────┴──── advance(delta) ────────┘
//! ```
//!
//! The outcome of the consistency race is computed from the snapshotted
//! millisecond values, never from animation timing, so it is identical
//! at any tick rate.

mod consistency;
mod events;
mod exporter;
mod failover;
mod read_flow;
mod runner;
mod schedule;
mod write_flow;
pub mod scenarios;

pub use consistency::{ConsistencyRace, RacePhase, DEFAULT_READ_DELAY_MS, MAX_READ_DELAY_MS};
pub use events::{EventKind, EventLog, TimelineEvent};
pub use exporter::{ExportError, LegProgress, SimExport, SimFrame};
pub use failover::{ElectionVote, Failover, FailoverPhase, QueuedRequest};
pub use read_flow::{ReadFlow, ReadPhase};
pub use runner::{ScenarioOutcome, ScenarioResult, ScenarioRunner};
pub use schedule::{
    leg_duration, ACK_PAUSE_SECS, ANIMATION_SPEED, MIN_LEG_DURATION, RESULT_PAUSE_SECS,
};
pub use write_flow::{ReplicaStatus, WriteFlow, WritePhase};
