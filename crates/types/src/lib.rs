#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const CURRENT_VERSION: &str = "1.0.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum NodeStatus {
    Online,
    #[default]
    Offline,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node status `{0}`, expected Online or Offline")]
pub struct ParseStatusError(pub String);

impl FromStr for NodeStatus {
    type Err = ParseStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(ParseStatusError(raw.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for NodeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// Pods with a missing or unrecognised status are listed as offline.
fn status_or_offline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeStatus, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => raw.parse().unwrap_or_default(),
        _ => NodeStatus::Offline,
    })
}

// Byte counters arrive as integers, floats (`4e9`) or numeric strings.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(number)) => {
            if let Some(exact) = number.as_u64() {
                return Ok(exact);
            }
            number.as_f64().unwrap_or_default()
        }
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("`{text}` is not a byte count")))?,
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a byte count, got {other}"
            )));
        }
    };
    if number.is_finite() && number > 0.0 {
        Ok(number.round() as u64)
    } else {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeLocation {
    pub country: String,
    pub city: String,
    pub flag: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeSpecs {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub ram: String,
    #[serde(rename = "ramType", default, skip_serializing_if = "String::is_empty")]
    pub ram_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
}

// Typed view of a pod as reported by `get-pods` or by the simulator. Fields
// the dashboard does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, deserialize_with = "status_or_offline")]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NodeLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<NodeSpecs>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NodeRecord {
    // `None` for pods that are not objects or carry mistyped text fields.
    pub fn from_pod(pod: &Value) -> Option<Self> {
        if !pod.is_object() {
            return None;
        }
        serde_json::from_value(pod.clone()).ok()
    }

    // Everything before the first `:`; addresses without a port are returned as-is.
    pub fn host(&self) -> &str {
        self.address
            .split_once(':')
            .map_or(self.address.as_str(), |(host, _)| host)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.location.as_ref().map(|location| location.country.as_str())
    }

    pub fn city(&self) -> Option<&str> {
        self.location.as_ref().map(|location| location.city.as_str())
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsMetadata {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryStats {
    pub cpu_percent: f64,
    #[serde(deserialize_with = "lenient_u64")]
    pub ram_used: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub ram_total: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeStats {
    #[serde(default)]
    pub metadata: StatsMetadata,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TelemetryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<NodeSpecs>,
}

impl NodeStats {
    pub fn free_bytes(&self) -> u64 {
        self.metadata.total_bytes.saturating_sub(self.file_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchOutcome {
    RealData,
    EmptyUpstream,
    UpstreamError(String),
    Timeout,
}

impl FetchOutcome {
    pub fn is_simulated(&self) -> bool {
        !matches!(self, Self::RealData)
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RealData => f.write_str("live upstream data"),
            Self::EmptyUpstream => f.write_str("upstream returned no data"),
            Self::UpstreamError(message) => write!(f, "upstream error: {message}"),
            Self::Timeout => f.write_str("upstream timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn simulated_pod_json() -> Value {
        json!({
            "address": "192.168.4.20:9001",
            "version": "1.0.2",
            "status": "Online",
            "last_seen": "Just now",
            "name": "Xand-Validator-1000",
            "provider": "Hetzner Online GmbH",
            "location": {
                "country": "DE",
                "city": "Frankfurt",
                "flag": "\u{1F1E9}\u{1F1EA}",
                "region": "Europe"
            },
            "specs": {
                "cpu": "12 vCPU",
                "ram": "64 GB",
                "ramType": "DDR5 ECC",
                "disk": "4TB NVMe SSD",
                "network": "10 Gbps Uplink"
            }
        })
    }

    #[test]
    fn decodes_simulated_pod_shape() {
        let node: NodeRecord = serde_json::from_value(simulated_pod_json()).expect("decode pod");
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.last_seen, "Just now");
        assert_eq!(node.country(), Some("DE"));
        assert_eq!(node.city(), Some("Frankfurt"));
        assert_eq!(
            node.specs.as_ref().map(|specs| specs.ram_type.as_str()),
            Some("DDR5 ECC")
        );
        assert!(node.extra.is_empty());
    }

    #[test]
    fn unknown_pod_fields_survive_a_round_trip() {
        let raw = json!({
            "address": "10.0.0.5:9001",
            "version": "1.0.1",
            "status": "Offline",
            "last_seen": "7 mins ago",
            "pubkey": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
            "uptime": 86400
        });
        let node: NodeRecord = serde_json::from_value(raw.clone()).expect("decode pod");
        assert_eq!(node.extra.get("uptime"), Some(&json!(86400)));
        assert_eq!(serde_json::to_value(&node).expect("encode pod"), raw);
    }

    #[test]
    fn status_is_read_leniently_on_pods() {
        let lower = NodeRecord::from_pod(&json!({"address": "10.0.0.5:9001", "status": "online"}))
            .expect("object pod");
        assert_eq!(lower.status, NodeStatus::Online);

        let missing = NodeRecord::from_pod(&json!({
            "address": "1.2.3.4:9001",
            "version": "0.7.1",
            "last_seen_timestamp": 1_700_000_000
        }))
        .expect("object pod");
        assert_eq!(missing.status, NodeStatus::Offline);
        assert_eq!(missing.version, "0.7.1");
        assert_eq!(
            missing.extra.get("last_seen_timestamp"),
            Some(&json!(1_700_000_000))
        );

        let unknown = NodeRecord::from_pod(&json!({"address": "10.0.0.6:9001", "status": "Syncing"}))
            .expect("object pod");
        assert_eq!(unknown.status, NodeStatus::Offline);

        assert_eq!(NodeRecord::from_pod(&json!("1.2.3.4:9001")), None);
    }

    #[test]
    fn absent_text_fields_are_not_invented_on_encode() {
        let node = NodeRecord::from_pod(&json!({"address": "1.2.3.4:9001", "status": "Online"}))
            .expect("object pod");
        assert_eq!(
            serde_json::to_value(&node).expect("encode pod"),
            json!({"address": "1.2.3.4:9001", "status": "Online"})
        );
    }

    #[test]
    fn status_serde_agrees_with_from_str() {
        let status: NodeStatus = serde_json::from_value(json!("OFFLINE")).expect("decode");
        assert_eq!(status, NodeStatus::Offline);
        assert!(serde_json::from_value::<NodeStatus>(json!("Syncing")).is_err());
    }

    #[test]
    fn float_byte_counters_decode() {
        let stats: NodeStats = serde_json::from_value(json!({
            "metadata": {"total_bytes": 4e9},
            "file_size": 1.5e9,
            "stats": {"cpu_percent": 3.5, "ram_used": "2048", "ram_total": 8e9}
        }))
        .expect("decode stats");
        assert_eq!(stats.metadata.total_bytes, 4_000_000_000);
        assert_eq!(stats.file_size, 1_500_000_000);
        assert_eq!(stats.free_bytes(), 2_500_000_000);
        let telemetry = stats.stats.expect("telemetry");
        assert_eq!(telemetry.ram_used, 2048);
        assert_eq!(telemetry.ram_total, 8_000_000_000);

        assert!(serde_json::from_value::<NodeStats>(json!({"file_size": [1]})).is_err());
    }

    #[test]
    fn host_strips_port() {
        let node: NodeRecord = serde_json::from_value(simulated_pod_json()).expect("decode pod");
        assert_eq!(node.host(), "192.168.4.20");

        let bare = NodeRecord {
            address: "node.example".to_string(),
            ..node
        };
        assert_eq!(bare.host(), "node.example");
    }

    #[test]
    fn partial_stats_payload_decodes_with_defaults() {
        let stats: NodeStats =
            serde_json::from_value(json!({"file_size": 1200})).expect("decode stats");
        assert_eq!(stats.file_size, 1200);
        assert_eq!(stats.metadata.total_bytes, 0);
        assert_eq!(stats.stats, None);
        assert_eq!(stats.free_bytes(), 0);

        let empty: NodeStats = serde_json::from_value(json!({})).expect("decode empty stats");
        assert_eq!(empty, NodeStats::default());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("online".parse::<NodeStatus>(), Ok(NodeStatus::Online));
        assert_eq!(" OFFLINE ".parse::<NodeStatus>(), Ok(NodeStatus::Offline));
        assert!("all".parse::<NodeStatus>().is_err());
    }

    #[test]
    fn only_real_data_is_not_simulated() {
        assert!(!FetchOutcome::RealData.is_simulated());
        assert!(FetchOutcome::EmptyUpstream.is_simulated());
        assert!(FetchOutcome::Timeout.is_simulated());
        assert!(FetchOutcome::UpstreamError("refused".to_string()).is_simulated());
        assert_eq!(
            serde_json::to_value(FetchOutcome::UpstreamError("refused".to_string()))
                .expect("encode outcome"),
            json!({"kind": "upstream_error", "detail": "refused"})
        );
    }
}
