use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::SystemTime;

/// ISO-8601 UTC, second precision, trailing `Z` — matches the catalog's timestamp format.
pub fn format_iso(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn now_iso() -> String {
    format_iso(SystemTime::now())
}

/// Reads a file's created/modified timestamps from the host filesystem, falling back to the
/// current UTC time when either is unavailable.
pub fn source_timestamps(path: &Path) -> std::io::Result<(String, String)> {
    let meta = std::fs::metadata(path)?;
    let created = meta
        .created()
        .map(format_iso)
        .unwrap_or_else(|_| now_iso());
    let modified = meta
        .modified()
        .map(format_iso)
        .unwrap_or_else(|_| now_iso());
    Ok((created, modified))
}
