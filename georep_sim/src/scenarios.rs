//! Learning-scenario identifiers.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Client write to the primary with fan-out replication
    WriteFlow,

    /// Read routed to the nearest active region
    ReadFlow,

    /// Replication wave racing a delayed read
    ConsistencyRace,

    /// Primary failure, leader election, recovery
    Failover,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::WriteFlow,
            ScenarioId::ReadFlow,
            ScenarioId::ConsistencyRace,
            ScenarioId::Failover,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::WriteFlow => "write_flow",
            ScenarioId::ReadFlow => "read_flow",
            ScenarioId::ConsistencyRace => "consistency_race",
            ScenarioId::Failover => "failover",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::WriteFlow => "Write to primary, ack, fan-out to every replica",
            ScenarioId::ReadFlow => "Read served by the nearest replica, response returned",
            ScenarioId::ConsistencyRace => "Delayed read vs. replication wave: stale or fresh?",
            ScenarioId::Failover => "Primary dies: detection, election, queued-write drain",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "write_flow" | "write" => Ok(ScenarioId::WriteFlow),
            "read_flow" | "read" => Ok(ScenarioId::ReadFlow),
            "consistency_race" | "consistency" | "race" => Ok(ScenarioId::ConsistencyRace),
            "failover" => Ok(ScenarioId::Failover),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
