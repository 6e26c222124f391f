use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use pnode_scan_types::{NodeRecord, NodeStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort direction `{0}`, expected asc or desc")]
pub struct ParseDirectionError(pub String);

impl FromStr for SortDirection {
    type Err = ParseDirectionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ParseDirectionError(raw.to_string())),
        }
    }
}

// `Country` and `Status` are resolved specially; every other key reads the
// record field of the same name, falling back to fields kept from upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    Address,
    Version,
    LastSeen,
    Name,
    Provider,
    Country,
    Status,
    Field(String),
}

impl SortKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Address => "address",
            Self::Version => "version",
            Self::LastSeen => "last_seen",
            Self::Name => "name",
            Self::Provider => "provider",
            Self::Country => "country",
            Self::Status => "status",
            Self::Field(name) => name,
        }
    }
}

impl FromStr for SortKey {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "address" => Self::Address,
            "version" => Self::Version,
            "last_seen" | "lastSeen" => Self::LastSeen,
            "name" => Self::Name,
            "provider" => Self::Provider,
            "country" => Self::Country,
            "status" => Self::Status,
            other => Self::Field(other.to_string()),
        })
    }
}

impl From<String> for SortKey {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    // Clicking the active ascending column flips it; anything else starts ascending.
    pub fn request(&self, key: SortKey) -> Self {
        let direction = if self.key.as_ref() == Some(&key) && self.direction == SortDirection::Asc
        {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self::by(key, direction)
    }
}

pub fn sort_nodes(nodes: &mut [NodeRecord], config: &SortConfig) {
    let Some(key) = config.key.as_ref() else {
        return;
    };
    nodes.sort_by(|a, b| config.direction.apply(compare_by(a, b, key)));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
}

fn sort_value<'a>(node: &'a NodeRecord, key: &SortKey) -> Option<SortValue<'a>> {
    match key {
        SortKey::Address => Some(SortValue::Text(&node.address)),
        SortKey::Version => Some(SortValue::Text(&node.version)),
        SortKey::LastSeen => Some(SortValue::Text(&node.last_seen)),
        SortKey::Name => node.name().map(SortValue::Text),
        SortKey::Provider => node.provider().map(SortValue::Text),
        SortKey::Country => node.country().map(SortValue::Text),
        SortKey::Status => Some(SortValue::Number(match node.status {
            NodeStatus::Online => 1.0,
            NodeStatus::Offline => 0.0,
        })),
        SortKey::Field(name) => match node.extra.get(name)? {
            Value::String(text) => Some(SortValue::Text(text)),
            Value::Number(number) => number.as_f64().map(SortValue::Number),
            Value::Bool(flag) => Some(SortValue::Number(if *flag { 1.0 } else { 0.0 })),
            _ => None,
        },
    }
}

// Total order: missing values first, then numbers, then strings.
fn compare_by(a: &NodeRecord, b: &NodeRecord, key: &SortKey) -> Ordering {
    match (sort_value(a, key), sort_value(b, key)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(SortValue::Number(a)), Some(SortValue::Number(b))) => a.total_cmp(&b),
        (Some(SortValue::Text(a)), Some(SortValue::Text(b))) => a.cmp(b),
        (Some(SortValue::Number(_)), Some(SortValue::Text(_))) => Ordering::Less,
        (Some(SortValue::Text(_)), Some(SortValue::Number(_))) => Ordering::Greater,
    }
}
