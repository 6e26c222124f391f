use pnode_scan_types::NodeRecord;

pub const CSV_HEADER: &str = "Address,Name,Provider,Country,City,Version,Status,LastSeen";

// Fields are joined as-is; every value we emit is a controlled-format string
// without commas, so no quoting is applied.
pub fn export_csv(nodes: &[NodeRecord]) -> String {
    let rows: Vec<String> = nodes.iter().map(csv_row).collect();
    format!("{CSV_HEADER}\n{}", rows.join("\n"))
}

pub fn export_file_name(unix_millis: u128) -> String {
    format!("xandeum-scan-{unix_millis}.csv")
}

fn csv_row(node: &NodeRecord) -> String {
    [
        node.address.as_str(),
        node.name().unwrap_or_default(),
        node.provider().unwrap_or_default(),
        node.country().unwrap_or_default(),
        node.city().unwrap_or_default(),
        node.version.as_str(),
        node.status.as_str(),
        node.last_seen.as_str(),
    ]
    .join(",")
}
