//! Round-trip latency estimation between geographic points and regions.
//!
//! Two sources feed every estimate: a curated table of real-world median
//! measurements for known region pairs, and a geometric fallback derived
//! from great-circle distance at light speed plus a network overhead
//! factor. Randomized variants take an injectable `Rng` so deterministic
//! runs can pin the jitter (seeded `ChaCha8Rng` in tests and the runner).

use crate::geo::{great_circle_distance_km, LatLon};
use crate::regions::{region_by_id, Region};
use rand::Rng;

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.0;

/// Multiplier covering routing, switching, and protocol overhead on top
/// of raw light time.
pub const NETWORK_OVERHEAD: f64 = 2.2;

/// Fixed per-request cost in milliseconds.
pub const BASE_LATENCY_MS: f64 = 1.0;

/// Symmetric jitter applied to single-run estimates (±12%).
pub const JITTER_RANGE: f64 = 0.12;

/// Sphere samples drawn for the global-coverage estimate.
pub const COVERAGE_SAMPLES: usize = 50;

/// Returned by [`estimate_global_coverage_with`] when no region resolves.
pub const NO_COVERAGE_SENTINEL_MS: u64 = 999;

// ── Real-world latency lookup (CloudPing P50 median values) ─────────
// Keys are alphabetically ordered region-id pairs.

const MEASURED_LATENCIES: &[(&str, &str, u64)] = &[
    ("af-south-1", "ap-northeast-1", 305),
    ("af-south-1", "ap-south-1", 184),
    ("af-south-1", "ap-southeast-1", 247),
    ("af-south-1", "ap-southeast-2", 327),
    ("af-south-1", "ca-central-1", 225),
    ("af-south-1", "eu-central-1", 155),
    ("af-south-1", "eu-west-1", 160),
    ("af-south-1", "eu-west-2", 147),
    ("af-south-1", "sa-east-1", 337),
    ("af-south-1", "us-east-1", 227),
    ("af-south-1", "us-east-2", 238),
    ("af-south-1", "us-west-1", 286),
    ("af-south-1", "us-west-2", 274),
    ("ap-northeast-1", "ap-south-1", 128),
    ("ap-northeast-1", "ap-southeast-1", 70),
    ("ap-northeast-1", "ap-southeast-2", 115),
    ("ap-northeast-1", "ca-central-1", 154),
    ("ap-northeast-1", "eu-central-1", 226),
    ("ap-northeast-1", "eu-west-1", 203),
    ("ap-northeast-1", "eu-west-2", 214),
    ("ap-northeast-1", "sa-east-1", 260),
    ("ap-northeast-1", "us-east-1", 149),
    ("ap-northeast-1", "us-east-2", 135),
    ("ap-northeast-1", "us-west-1", 109),
    ("ap-northeast-1", "us-west-2", 99),
    ("ap-south-1", "ap-southeast-1", 62),
    ("ap-south-1", "ap-southeast-2", 153),
    ("ap-south-1", "ca-central-1", 188),
    ("ap-south-1", "eu-central-1", 114),
    ("ap-south-1", "eu-west-1", 125),
    ("ap-south-1", "eu-west-2", 115),
    ("ap-south-1", "sa-east-1", 297),
    ("ap-south-1", "us-east-1", 190),
    ("ap-south-1", "us-east-2", 200),
    ("ap-south-1", "us-west-1", 237),
    ("ap-south-1", "us-west-2", 224),
    ("ap-southeast-1", "ap-southeast-2", 94),
    ("ap-southeast-1", "ca-central-1", 225),
    ("ap-southeast-1", "eu-central-1", 160),
    ("ap-southeast-1", "eu-west-1", 176),
    ("ap-southeast-1", "eu-west-2", 173),
    ("ap-southeast-1", "sa-east-1", 325),
    ("ap-southeast-1", "us-east-1", 217),
    ("ap-southeast-1", "us-east-2", 208),
    ("ap-southeast-1", "us-west-1", 176),
    ("ap-southeast-1", "us-west-2", 166),
    ("ap-southeast-2", "ca-central-1", 198),
    ("ap-southeast-2", "eu-central-1", 253),
    ("ap-southeast-2", "eu-west-1", 255),
    ("ap-southeast-2", "eu-west-2", 266),
    ("ap-southeast-2", "sa-east-1", 311),
    ("ap-southeast-2", "us-east-1", 199),
    ("ap-southeast-2", "us-east-2", 188),
    ("ap-southeast-2", "us-west-1", 139),
    ("ap-southeast-2", "us-west-2", 141),
    ("ca-central-1", "eu-central-1", 93),
    ("ca-central-1", "eu-west-1", 69),
    ("ca-central-1", "eu-west-2", 78),
    ("ca-central-1", "sa-east-1", 126),
    ("ca-central-1", "us-east-1", 16),
    ("ca-central-1", "us-east-2", 26),
    ("ca-central-1", "us-west-1", 79),
    ("ca-central-1", "us-west-2", 61),
    ("eu-central-1", "eu-west-1", 22),
    ("eu-central-1", "eu-west-2", 15),
    ("eu-central-1", "sa-east-1", 204),
    ("eu-central-1", "us-east-1", 94),
    ("eu-central-1", "us-east-2", 103),
    ("eu-central-1", "us-west-1", 153),
    ("eu-central-1", "us-west-2", 143),
    ("eu-west-1", "eu-west-2", 12),
    ("eu-west-1", "sa-east-1", 178),
    ("eu-west-1", "us-east-1", 70),
    ("eu-west-1", "us-east-2", 80),
    ("eu-west-1", "us-west-1", 130),
    ("eu-west-1", "us-west-2", 119),
    ("eu-west-2", "sa-east-1", 187),
    ("eu-west-2", "us-east-1", 78),
    ("eu-west-2", "us-east-2", 89),
    ("eu-west-2", "us-west-1", 147),
    ("eu-west-2", "us-west-2", 128),
    ("sa-east-1", "us-east-1", 115),
    ("sa-east-1", "us-east-2", 124),
    ("sa-east-1", "us-west-1", 174),
    ("sa-east-1", "us-west-2", 174),
    ("us-east-1", "us-east-2", 13),
    ("us-east-1", "us-west-1", 59),
    ("us-east-1", "us-west-2", 66),
    ("us-east-2", "us-west-1", 50),
    ("us-east-2", "us-west-2", 59),
    ("us-west-1", "us-west-2", 24),
];

/// Maps GCP regions onto their co-located AWS counterparts so the
/// measured table applies to both providers. `asia-northeast1` has no
/// mapping and resolves through the geometric formula instead.
fn lookup_region(id: &str) -> &str {
    match id {
        "us-east4" => "us-east-1",
        "us-central1" => "us-east-2",
        "europe-west1" => "eu-west-2",
        other => other,
    }
}

/// Real-world median latency for a region pair, before jitter.
///
/// Co-located pairs (same id after mapping) report 1 ms. Returns `None`
/// when no measurement exists.
pub fn measured_latency(id_a: &str, id_b: &str) -> Option<u64> {
    let a = lookup_region(id_a);
    let b = lookup_region(id_b);

    if a == b {
        return Some(1);
    }

    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    MEASURED_LATENCIES
        .iter()
        .find(|(x, y, _)| *x == lo && *y == hi)
        .map(|(_, _, ms)| *ms)
}

fn formula_latency_ms(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let distance_km = great_circle_distance_km(lat1, lon1, lat2, lon2);
    let light_time_ms = distance_km / SPEED_OF_LIGHT_KM_S * 1000.0;
    let round_trip_ms = light_time_ms * 2.0;
    BASE_LATENCY_MS + round_trip_ms * NETWORK_OVERHEAD
}

fn jitter_factor(rng: &mut impl Rng) -> f64 {
    1.0 + (rng.gen::<f64>() * 2.0 - 1.0) * JITTER_RANGE
}

/// Deterministic round-trip estimate between two geographic points.
///
/// Identical inputs always yield identical output; used wherever
/// comparison stability matters (nearest-region choice, coverage).
pub fn estimate_latency_stable(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> u64 {
    formula_latency_ms(lat1, lon1, lat2, lon2).round() as u64
}

/// Round-trip estimate with ±12% jitter drawn from the supplied RNG.
pub fn estimate_latency_with(
    rng: &mut impl Rng,
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> u64 {
    (formula_latency_ms(lat1, lon1, lat2, lon2) * jitter_factor(rng)).round() as u64
}

/// Jittered estimate using the thread-local RNG.
pub fn estimate_latency(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> u64 {
    estimate_latency_with(&mut rand::thread_rng(), lat1, lon1, lat2, lon2)
}

/// Latency between two regions by id, jitter from the supplied RNG.
///
/// Prefers the measured table (after co-location mapping), falling back
/// to the geometric formula on the raw coordinates. `None` only when
/// either id is unknown.
pub fn estimate_latency_between_regions_with(
    rng: &mut impl Rng,
    region_id_a: &str,
    region_id_b: &str,
) -> Option<u64> {
    let a = region_by_id(region_id_a)?;
    let b = region_by_id(region_id_b)?;

    if let Some(measured) = measured_latency(region_id_a, region_id_b) {
        return Some((measured as f64 * jitter_factor(rng)).round() as u64);
    }

    Some(estimate_latency_with(rng, a.lat, a.lon, b.lat, b.lon))
}

/// Region-pair latency using the thread-local RNG.
pub fn estimate_latency_between_regions(region_id_a: &str, region_id_b: &str) -> Option<u64> {
    estimate_latency_between_regions_with(&mut rand::thread_rng(), region_id_a, region_id_b)
}

/// Mean replication latency from the primary to every resolvable replica.
///
/// `None` when the replica set is empty or no pair resolves.
pub fn average_replication_latency_with(
    rng: &mut impl Rng,
    primary_id: &str,
    replica_ids: &[&str],
) -> Option<u64> {
    if replica_ids.is_empty() {
        return None;
    }

    let mut total = 0u64;
    let mut count = 0u64;
    for id in replica_ids {
        if let Some(latency) = estimate_latency_between_regions_with(rng, primary_id, id) {
            total += latency;
            count += 1;
        }
    }

    if count > 0 {
        Some((total as f64 / count as f64).round() as u64)
    } else {
        None
    }
}

/// Mean replication latency using the thread-local RNG.
pub fn average_replication_latency(primary_id: &str, replica_ids: &[&str]) -> Option<u64> {
    average_replication_latency_with(&mut rand::thread_rng(), primary_id, replica_ids)
}

/// Monte Carlo estimate of read latency for a uniformly global user base.
///
/// Draws [`COVERAGE_SAMPLES`] uniform points on the sphere and averages
/// each point's minimum stable latency to any active region. More
/// replicas can only lower the expected value, though individual draws
/// vary. Returns [`NO_COVERAGE_SENTINEL_MS`] when no region resolves.
pub fn estimate_global_coverage_with(
    rng: &mut impl Rng,
    primary_id: &str,
    replica_ids: &[&str],
) -> u64 {
    let regions: Vec<&'static Region> = std::iter::once(primary_id)
        .chain(replica_ids.iter().copied())
        .filter_map(region_by_id)
        .collect();

    if regions.is_empty() {
        return NO_COVERAGE_SENTINEL_MS;
    }

    let mut total = 0.0;
    for _ in 0..COVERAGE_SAMPLES {
        // Uniform on the sphere: lat via inverse-CDF, lon uniform.
        let lat = (2.0 * rng.gen::<f64>() - 1.0).asin() * 180.0 / std::f64::consts::PI;
        let lon = rng.gen::<f64>() * 360.0 - 180.0;

        let min_latency = regions
            .iter()
            .map(|r| estimate_latency_stable(lat, lon, r.lat, r.lon))
            .min()
            .unwrap_or(NO_COVERAGE_SENTINEL_MS);
        total += min_latency as f64;
    }

    (total / COVERAGE_SAMPLES as f64).round() as u64
}

/// Global coverage using the thread-local RNG.
pub fn estimate_global_coverage(primary_id: &str, replica_ids: &[&str]) -> u64 {
    estimate_global_coverage_with(&mut rand::thread_rng(), primary_id, replica_ids)
}

/// Picks the candidate region with the lowest stable latency from the
/// client. Ties keep the earliest candidate. `None` when nothing
/// resolves.
pub fn nearest_region(client: LatLon, candidate_ids: &[&str]) -> Option<(&'static Region, u64)> {
    let mut best: Option<(&'static Region, u64)> = None;
    for id in candidate_ids {
        let Some(region) = region_by_id(id) else {
            continue;
        };
        let latency = estimate_latency_stable(client.lat, client.lon, region.lat, region.lon);
        if best.map_or(true, |(_, current)| latency < current) {
            best = Some((region, latency));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_stable_estimate_deterministic() {
        let a = estimate_latency_stable(39.0438, -77.4874, 35.6762, 139.6503);
        let b = estimate_latency_stable(39.0438, -77.4874, 35.6762, 139.6503);
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn test_stable_estimate_same_point() {
        // Zero distance leaves only the base cost.
        assert_eq!(estimate_latency_stable(10.0, 20.0, 10.0, 20.0), 1);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let stable = estimate_latency_stable(39.0438, -77.4874, 35.6762, 139.6503) as f64;
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..200 {
            let jittered =
                estimate_latency_with(&mut rng, 39.0438, -77.4874, 35.6762, 139.6503) as f64;
            assert!(jittered >= (stable * (1.0 - JITTER_RANGE)).floor());
            assert!(jittered <= (stable * (1.0 + JITTER_RANGE)).ceil());
        }
    }

    #[test]
    fn test_measured_table_symmetric() {
        assert_eq!(measured_latency("eu-west-1", "us-east-1"), Some(70));
        assert_eq!(measured_latency("us-east-1", "eu-west-1"), Some(70));
    }

    #[test]
    fn test_colocated_regions_minimal_latency() {
        // GCP Ashburn maps onto AWS Virginia.
        assert_eq!(measured_latency("us-east4", "us-east-1"), Some(1));
        assert_eq!(measured_latency("us-east-1", "us-east-1"), Some(1));
    }

    #[test]
    fn test_unmapped_gcp_region_falls_back_to_formula() {
        // asia-northeast1 has no AWS alias, so no table entry matches.
        assert_eq!(measured_latency("asia-northeast1", "us-east-1"), None);

        // The region pair still resolves via coordinates.
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let latency =
            estimate_latency_between_regions_with(&mut rng, "asia-northeast1", "us-east-1");
        assert!(latency.is_some());
    }

    #[test]
    fn test_unknown_region_is_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            estimate_latency_between_regions_with(&mut rng, "nope-1", "us-east-1"),
            None
        );
        assert_eq!(
            average_replication_latency_with(&mut rng, "us-east-1", &["nope-1"]),
            None
        );
    }

    #[test]
    fn test_average_replication_latency() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(average_replication_latency_with(&mut rng, "us-east-1", &[]), None);

        let avg = average_replication_latency_with(
            &mut rng,
            "us-east-1",
            &["eu-west-1", "ap-southeast-1"],
        )
        .unwrap();
        // Measured medians are 70 and 217; jitter keeps the mean nearby.
        assert!(avg >= 120 && avg <= 170, "avg={}", avg);
    }

    #[test]
    fn test_coverage_sentinel_without_regions() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            estimate_global_coverage_with(&mut rng, "unknown", &[]),
            NO_COVERAGE_SENTINEL_MS
        );
    }

    #[test]
    fn test_coverage_improves_with_replicas() {
        // Same seed draws the same sample points, so adding a replica can
        // only lower each point's minimum.
        let solo = estimate_global_coverage_with(
            &mut ChaCha8Rng::seed_from_u64(42),
            "us-east-1",
            &[],
        );
        let spread = estimate_global_coverage_with(
            &mut ChaCha8Rng::seed_from_u64(42),
            "us-east-1",
            &["ap-southeast-1", "eu-west-1", "ap-southeast-2"],
        );
        assert!(spread <= solo, "spread={} solo={}", spread, solo);
    }

    #[test]
    fn test_nearest_region_prefers_closest() {
        // Client in Berlin: Frankfurt beats Virginia and Singapore.
        let client = LatLon::new(52.52, 13.405);
        let (region, latency) = nearest_region(
            client,
            &["us-east-1", "eu-central-1", "ap-southeast-1"],
        )
        .unwrap();
        assert_eq!(region.id, "eu-central-1");
        assert!(latency < 20);

        assert!(nearest_region(client, &[]).is_none());
        assert!(nearest_region(client, &["nope-1"]).is_none());
    }
}
