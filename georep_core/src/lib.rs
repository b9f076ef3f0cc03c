//! georep Core - Region catalog, spherical geometry, and latency model
//!
//! This library supplies every number the georep simulator animates:
//! 1. **Geo**: lat/lon ↔ Cartesian projection, haversine distance, arc paths
//! 2. **Regions**: static data-center directory with co-location grouping
//! 3. **Latency**: measured-table + light-speed-formula round-trip estimates
//! 4. **Topology**: the primary/replica selection every scenario reads

pub mod geo;
pub mod latency;
pub mod regions;
pub mod topology;

// Re-export key types for convenience
pub use geo::LatLon;
pub use regions::{Provider, Region, RegionGroup, REGIONS};
pub use topology::{DatabaseTopology, TopologySnapshot};
