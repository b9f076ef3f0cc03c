//! Static catalog of data-center regions.
//!
//! Entries are defined at compile time and never mutated. Regions from
//! different providers that share (near-identical) coordinates are grouped
//! for display and treated as co-located by the latency model.

use serde::Serialize;

/// Cloud provider hosting a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Aws => write!(f, "aws"),
            Provider::Gcp => write!(f, "gcp"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "gcp" => Ok(Provider::Gcp),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// A catalog entry for one data-center region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    /// Unique key, e.g. "us-east-1"
    pub id: &'static str,

    /// Provider-facing region code (matches `id` for the current catalog)
    pub code: &'static str,

    /// Short label for dense UIs
    pub abbreviation: &'static str,

    /// Hosting provider
    pub provider: Provider,

    /// Nearest city
    pub city: &'static str,

    /// Country
    pub country: &'static str,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,
}

/// The full region directory: 14 AWS regions plus 4 GCP regions.
pub const REGIONS: &[Region] = &[
    Region {
        id: "us-east-1",
        code: "us-east-1",
        abbreviation: "us1",
        provider: Provider::Aws,
        city: "N. Virginia",
        country: "USA",
        lat: 39.0438,
        lon: -77.4874,
    },
    Region {
        id: "us-east-2",
        code: "us-east-2",
        abbreviation: "use2",
        provider: Provider::Aws,
        city: "Ohio",
        country: "USA",
        lat: 40.4173,
        lon: -82.9071,
    },
    Region {
        id: "us-west-1",
        code: "us-west-1",
        abbreviation: "us2",
        provider: Provider::Aws,
        city: "N. California",
        country: "USA",
        lat: 37.3382,
        lon: -121.8863,
    },
    Region {
        id: "us-west-2",
        code: "us-west-2",
        abbreviation: "us3",
        provider: Provider::Aws,
        city: "Oregon",
        country: "USA",
        lat: 45.5152,
        lon: -122.6784,
    },
    Region {
        id: "ca-central-1",
        code: "ca-central-1",
        abbreviation: "cac1",
        provider: Provider::Aws,
        city: "Montreal",
        country: "Canada",
        lat: 45.5017,
        lon: -73.5673,
    },
    Region {
        id: "eu-west-1",
        code: "eu-west-1",
        abbreviation: "eu1",
        provider: Provider::Aws,
        city: "Ireland",
        country: "Ireland",
        lat: 53.3498,
        lon: -6.2603,
    },
    Region {
        id: "eu-west-2",
        code: "eu-west-2",
        abbreviation: "euw2",
        provider: Provider::Aws,
        city: "London",
        country: "UK",
        lat: 51.5074,
        lon: -0.1278,
    },
    Region {
        id: "eu-central-1",
        code: "eu-central-1",
        abbreviation: "eu2",
        provider: Provider::Aws,
        city: "Frankfurt",
        country: "Germany",
        lat: 50.1109,
        lon: 8.6821,
    },
    Region {
        id: "ap-south-1",
        code: "ap-south-1",
        abbreviation: "as1",
        provider: Provider::Aws,
        city: "Mumbai",
        country: "India",
        lat: 19.076,
        lon: 72.8777,
    },
    Region {
        id: "ap-northeast-1",
        code: "ap-northeast-1",
        abbreviation: "apn1",
        provider: Provider::Aws,
        city: "Tokyo",
        country: "Japan",
        lat: 35.6762,
        lon: 139.6503,
    },
    Region {
        id: "ap-southeast-1",
        code: "ap-southeast-1",
        abbreviation: "ap1",
        provider: Provider::Aws,
        city: "Singapore",
        country: "Singapore",
        lat: 1.3521,
        lon: 103.8198,
    },
    Region {
        id: "ap-southeast-2",
        code: "ap-southeast-2",
        abbreviation: "ap2",
        provider: Provider::Aws,
        city: "Sydney",
        country: "Australia",
        lat: -33.8688,
        lon: 151.2093,
    },
    Region {
        id: "sa-east-1",
        code: "sa-east-1",
        abbreviation: "sa1",
        provider: Provider::Aws,
        city: "São Paulo",
        country: "Brazil",
        lat: -23.5505,
        lon: -46.6333,
    },
    Region {
        id: "af-south-1",
        code: "af-south-1",
        abbreviation: "afs1",
        provider: Provider::Aws,
        city: "Cape Town",
        country: "South Africa",
        lat: -33.9249,
        lon: 18.4241,
    },
    Region {
        id: "us-east4",
        code: "us-east4",
        abbreviation: "use4",
        provider: Provider::Gcp,
        city: "Ashburn",
        country: "USA",
        lat: 39.0438,
        lon: -77.4874,
    },
    Region {
        id: "us-central1",
        code: "us-central1",
        abbreviation: "usc1",
        provider: Provider::Gcp,
        city: "Iowa",
        country: "USA",
        lat: 41.2619,
        lon: -95.8608,
    },
    Region {
        id: "europe-west1",
        code: "europe-west1",
        abbreviation: "euw1",
        provider: Provider::Gcp,
        city: "Belgium",
        country: "Belgium",
        lat: 50.4697,
        lon: 3.811,
    },
    Region {
        id: "asia-northeast1",
        code: "asia-northeast1",
        abbreviation: "ane1",
        provider: Provider::Gcp,
        city: "Tokyo",
        country: "Japan",
        lat: 35.6762,
        lon: 139.6503,
    },
];

/// Looks up a region by its unique id.
pub fn region_by_id(id: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id == id)
}

/// Returns all regions hosted by the given provider.
pub fn regions_by_provider(provider: Provider) -> Vec<&'static Region> {
    REGIONS.iter().filter(|r| r.provider == provider).collect()
}

/// A bundle of co-located regions rendered as a single marker.
#[derive(Debug, Clone, Serialize)]
pub struct RegionGroup {
    /// Rounded "lat,lon" key shared by the group members
    pub key: String,

    /// Representative coordinates (first member's exact position)
    pub lat: f64,
    pub lon: f64,

    /// Members sharing this location
    pub regions: Vec<&'static Region>,
}

/// Groups regions whose coordinates coincide after rounding to 0.1°.
///
/// E.g. us-east-1 (AWS) and us-east4 (GCP) both sit in Virginia. Group
/// order follows first appearance in the input slice.
pub fn group_regions_by_location(regions: &'static [Region]) -> Vec<RegionGroup> {
    let mut groups: Vec<RegionGroup> = Vec::new();

    for region in regions {
        let key = format!("{:.1},{:.1}", region.lat, region.lon);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.regions.push(region),
            None => groups.push(RegionGroup {
                key,
                lat: region.lat,
                lon: region.lon,
                regions: vec![region],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_lookup() {
        let tokyo = region_by_id("ap-northeast-1").unwrap();
        assert_eq!(tokyo.city, "Tokyo");
        assert_eq!(tokyo.provider, Provider::Aws);

        assert!(region_by_id("mars-north-1").is_none());
    }

    #[test]
    fn test_unique_ids() {
        for (i, a) in REGIONS.iter().enumerate() {
            for b in &REGIONS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_provider_split() {
        assert_eq!(regions_by_provider(Provider::Aws).len(), 14);
        assert_eq!(regions_by_provider(Provider::Gcp).len(), 4);
    }

    #[test]
    fn test_colocated_regions_grouped() {
        let groups = group_regions_by_location(REGIONS);

        // Virginia: us-east-1 + us-east4. Tokyo: ap-northeast-1 + asia-northeast1.
        let virginia = groups
            .iter()
            .find(|g| g.regions.iter().any(|r| r.id == "us-east-1"))
            .unwrap();
        assert_eq!(virginia.regions.len(), 2);
        assert!(virginia.regions.iter().any(|r| r.id == "us-east4"));

        let tokyo = groups
            .iter()
            .find(|g| g.regions.iter().any(|r| r.id == "ap-northeast-1"))
            .unwrap();
        assert_eq!(tokyo.regions.len(), 2);

        // 18 regions collapse into 16 markers.
        assert_eq!(groups.len(), 16);
        let total: usize = groups.iter().map(|g| g.regions.len()).sum();
        assert_eq!(total, REGIONS.len());
    }

    #[test]
    fn test_coordinate_ranges() {
        for region in REGIONS {
            assert!((-90.0..=90.0).contains(&region.lat), "{}", region.id);
            assert!((-180.0..=180.0).contains(&region.lon), "{}", region.id);
        }
    }
}
