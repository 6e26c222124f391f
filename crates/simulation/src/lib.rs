#![forbid(unsafe_code)]

//! Synthetic pNode fleet and telemetry used whenever the upstream RPC
//! endpoint is unreachable or has nothing to report.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use pnode_scan_types::{
    NodeLocation, NodeRecord, NodeSpecs, NodeStats, NodeStatus, StatsMetadata, TelemetryStats,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MOCK_FLEET_SIZE: usize = 58;
pub const MOCK_NODE_PORT: u16 = 9001;
pub const MOCK_NAME_BASE: usize = 1_000;
pub const ONLINE_PROBABILITY: f64 = 0.88;

pub const INSPECTOR_TOTAL_BYTES: u64 = 4_000_000_000;
pub const INSPECTOR_MAX_FILE_SIZE: u64 = 2_000_000_000;

pub const ENDPOINT_TOTAL_BYTES: u64 = 1_000_000_000_000;
pub const ENDPOINT_FILE_SIZE: u64 = 450_000_000_000;
pub const ENDPOINT_RAM_USED: u64 = 8_500_000_000;
pub const ENDPOINT_RAM_TOTAL: u64 = 16_000_000_000;

const MOCK_LOCATIONS: [(&str, &str, &str, &str); 13] = [
    ("US", "Ashburn", "\u{1F1FA}\u{1F1F8}", "North America"),
    ("US", "Virginia", "\u{1F1FA}\u{1F1F8}", "North America"),
    ("DE", "Frankfurt", "\u{1F1E9}\u{1F1EA}", "Europe"),
    ("DE", "Nuremberg", "\u{1F1E9}\u{1F1EA}", "Europe"),
    ("JP", "Tokyo", "\u{1F1EF}\u{1F1F5}", "Asia"),
    ("SG", "Singapore", "\u{1F1F8}\u{1F1EC}", "Asia"),
    ("GB", "London", "\u{1F1EC}\u{1F1E7}", "Europe"),
    ("IN", "Mumbai", "\u{1F1EE}\u{1F1F3}", "Asia"),
    ("CA", "Toronto", "\u{1F1E8}\u{1F1E6}", "North America"),
    ("NL", "Amsterdam", "\u{1F1F3}\u{1F1F1}", "Europe"),
    ("FR", "Paris", "\u{1F1EB}\u{1F1F7}", "Europe"),
    ("BR", "Sao Paulo", "\u{1F1E7}\u{1F1F7}", "South America"),
    ("AU", "Sydney", "\u{1F1E6}\u{1F1FA}", "Oceania"),
];

const MOCK_PROVIDERS: [&str; 8] = [
    "AWS (Amazon Web Services)",
    "Google Cloud Platform",
    "Hetzner Online GmbH",
    "DigitalOcean",
    "Vultr Holdings",
    "Linode",
    "OVH SAS",
    "Home Staking (Residential)",
];

// Four of five slots carry the current release.
const VERSION_POOL: [&str; 5] = ["1.0.2", "1.0.2", "1.0.2", "1.0.2", "1.0.1"];

const DEFAULT_INSPECTOR_CPU: &str = "8 vCPU";
const DEFAULT_INSPECTOR_RAM: &str = "32 GB";

pub fn generate_fleet<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<NodeRecord> {
    (0..count).map(|index| generate_node(rng, index)).collect()
}

pub fn generate_node<R: Rng + ?Sized>(rng: &mut R, index: usize) -> NodeRecord {
    let status = if rng.gen_bool(ONLINE_PROBABILITY) {
        NodeStatus::Online
    } else {
        NodeStatus::Offline
    };
    let (country, city, flag, region) = MOCK_LOCATIONS[rng.gen_range(0..MOCK_LOCATIONS.len())];
    let provider = MOCK_PROVIDERS[rng.gen_range(0..MOCK_PROVIDERS.len())];
    let octet = rng.gen_range(0..255_u8);
    let sub_octet = rng.gen_range(0..255_u8);
    let version = VERSION_POOL[rng.gen_range(0..VERSION_POOL.len())];
    let last_seen = match status {
        NodeStatus::Online => "Just now".to_string(),
        NodeStatus::Offline => format!("{} mins ago", rng.gen_range(0..120_u32)),
    };
    let cpu_cores = rng.gen_range(4..28_u32);
    let ram_gb = rng.gen_range(16..144_u32);

    NodeRecord {
        address: format!("192.168.{octet}.{sub_octet}:{MOCK_NODE_PORT}"),
        version: version.to_string(),
        status,
        last_seen,
        name: Some(format!("Xand-Validator-{}", MOCK_NAME_BASE + index)),
        provider: Some(provider.to_string()),
        location: Some(NodeLocation {
            country: country.to_string(),
            city: city.to_string(),
            flag: flag.to_string(),
            region: region.to_string(),
        }),
        specs: Some(NodeSpecs {
            cpu: format!("{cpu_cores} vCPU"),
            ram: format!("{ram_gb} GB"),
            ram_type: "DDR5 ECC".to_string(),
            disk: "4TB NVMe SSD".to_string(),
            network: "10 Gbps Uplink".to_string(),
        }),
        extra: BTreeMap::new(),
    }
}

// What the node inspector shows when a node's own stats endpoint does not answer.
pub fn inspector_stats<R: Rng + ?Sized>(rng: &mut R, specs: Option<&NodeSpecs>) -> NodeStats {
    let specs = specs.cloned().unwrap_or_else(|| NodeSpecs {
        cpu: DEFAULT_INSPECTOR_CPU.to_string(),
        ram: DEFAULT_INSPECTOR_RAM.to_string(),
        ..NodeSpecs::default()
    });
    NodeStats {
        metadata: StatsMetadata {
            total_bytes: INSPECTOR_TOTAL_BYTES,
        },
        file_size: rng.gen_range(0..INSPECTOR_MAX_FILE_SIZE),
        stats: None,
        specs: Some(specs),
    }
}

pub fn endpoint_stats<R: Rng + ?Sized>(rng: &mut R) -> NodeStats {
    NodeStats {
        metadata: StatsMetadata {
            total_bytes: ENDPOINT_TOTAL_BYTES,
        },
        file_size: ENDPOINT_FILE_SIZE,
        stats: Some(TelemetryStats {
            cpu_percent: f64::from(rng.gen_range(0..100_u32)),
            ram_used: ENDPOINT_RAM_USED,
            ram_total: ENDPOINT_RAM_TOTAL,
        }),
        specs: None,
    }
}

#[derive(Debug)]
pub struct Simulator {
    rng: Mutex<StdRng>,
}

impl Simulator {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn fleet(&self, count: usize) -> Vec<NodeRecord> {
        self.with(|rng| generate_fleet(rng, count))
    }

    pub fn inspector_stats(&self, specs: Option<&NodeSpecs>) -> NodeStats {
        self.with(|rng| inspector_stats(rng, specs))
    }

    pub fn endpoint_stats(&self) -> NodeStats {
        self.with(endpoint_stats)
    }

    fn with<T>(&self, generate: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        generate(&mut *rng)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn fleet_has_requested_size_and_sequential_names() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in [0, 1, 10, MOCK_FLEET_SIZE] {
            let fleet = generate_fleet(&mut rng, count);
            assert_eq!(fleet.len(), count);
            for (index, node) in fleet.iter().enumerate() {
                assert!(!node.address.is_empty());
                assert_eq!(
                    node.name.as_deref(),
                    Some(format!("Xand-Validator-{}", 1_000 + index).as_str())
                );
                assert!(matches!(node.status, NodeStatus::Online | NodeStatus::Offline));
            }
        }
    }

    #[test]
    fn records_follow_the_simulated_formats() {
        let mut rng = StdRng::seed_from_u64(42);
        let providers: BTreeSet<&str> = MOCK_PROVIDERS.into_iter().collect();
        for node in generate_fleet(&mut rng, 500) {
            let (host, port) = node.address.split_once(':').expect("host:port");
            assert_eq!(port, "9001");
            let octets: Vec<u32> = host
                .split('.')
                .map(|octet| octet.parse().expect("numeric octet"))
                .collect();
            assert_eq!(octets.len(), 4);
            assert_eq!(&octets[..2], &[192, 168]);
            assert!(octets[2] < 255 && octets[3] < 255);

            assert!(VERSION_POOL.contains(&node.version.as_str()));
            assert!(providers.contains(node.provider.as_deref().expect("provider")));
            let location = node.location.as_ref().expect("location");
            assert!(MOCK_LOCATIONS.iter().any(|(country, city, _, _)| {
                *country == location.country && *city == location.city
            }));

            match node.status {
                NodeStatus::Online => assert_eq!(node.last_seen, "Just now"),
                NodeStatus::Offline => {
                    let minutes: u32 = node
                        .last_seen
                        .strip_suffix(" mins ago")
                        .expect("offline recency")
                        .parse()
                        .expect("minutes");
                    assert!(minutes < 120);
                }
            }

            let specs = node.specs.as_ref().expect("specs");
            let cores: u32 = specs
                .cpu
                .strip_suffix(" vCPU")
                .expect("cpu suffix")
                .parse()
                .expect("cores");
            assert!((4..28).contains(&cores));
            let ram: u32 = specs
                .ram
                .strip_suffix(" GB")
                .expect("ram suffix")
                .parse()
                .expect("ram");
            assert!((16..144).contains(&ram));
            assert_eq!(specs.ram_type, "DDR5 ECC");
            assert_eq!(specs.disk, "4TB NVMe SSD");
            assert_eq!(specs.network, "10 Gbps Uplink");
        }
    }

    #[test]
    fn most_generated_nodes_are_online() {
        let mut rng = StdRng::seed_from_u64(3);
        let fleet = generate_fleet(&mut rng, 2_000);
        let online = fleet.iter().filter(|node| node.is_online()).count();
        assert!(online > 1_600 && online < 1_900, "online={online}");
    }

    #[test]
    fn seeded_simulators_are_reproducible() {
        let first = Simulator::seeded(99).fleet(MOCK_FLEET_SIZE);
        let second = Simulator::seeded(99).fleet(MOCK_FLEET_SIZE);
        assert_eq!(first, second);
        assert_ne!(first, Simulator::seeded(100).fleet(MOCK_FLEET_SIZE));
    }

    #[test]
    fn inspector_stats_copy_node_specs() {
        let simulator = Simulator::seeded(5);
        let specs = NodeSpecs {
            cpu: "16 vCPU".to_string(),
            ram: "64 GB".to_string(),
            ..NodeSpecs::default()
        };
        for _ in 0..200 {
            let stats = simulator.inspector_stats(Some(&specs));
            assert_eq!(stats.metadata.total_bytes, 4_000_000_000);
            assert!(stats.file_size < 2_000_000_000);
            assert_eq!(stats.specs.as_ref(), Some(&specs));
        }
    }

    #[test]
    fn inspector_stats_default_specs_when_node_has_none() {
        let stats = Simulator::seeded(5).inspector_stats(None);
        let specs = stats.specs.expect("default specs");
        assert_eq!(specs.cpu, "8 vCPU");
        assert_eq!(specs.ram, "32 GB");
    }

    #[test]
    fn endpoint_stats_use_fixed_storage_figures() {
        let simulator = Simulator::seeded(11);
        for _ in 0..100 {
            let stats = simulator.endpoint_stats();
            assert_eq!(stats.metadata.total_bytes, ENDPOINT_TOTAL_BYTES);
            assert_eq!(stats.file_size, ENDPOINT_FILE_SIZE);
            let telemetry = stats.stats.expect("telemetry");
            assert!((0.0..100.0).contains(&telemetry.cpu_percent));
            assert_eq!(telemetry.ram_used, ENDPOINT_RAM_USED);
            assert_eq!(telemetry.ram_total, ENDPOINT_RAM_TOTAL);
        }
    }
}
