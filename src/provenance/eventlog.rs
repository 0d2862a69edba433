//! NL-011: Append-only JSONL provenance log of plan executions.

use crate::core::error::{LaunchError, LaunchResult};
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};

/// ISO 8601 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_iso8601(secs)
}

fn format_iso8601(secs: u64) -> String {
    let days = secs / 86400;
    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    let mut y = 1970i64;
    let mut remaining = days as i64;
    loop {
        let year_days = if is_leap(y) { 366 } else { 365 };
        if remaining < year_days {
            break;
        }
        remaining -= year_days;
        y += 1;
    }
    let feb = if is_leap(y) { 29 } else { 28 };
    let month_days = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut m = 12;
    for (i, &md) in month_days.iter().enumerate() {
        if remaining < md {
            m = i + 1;
            break;
        }
        remaining -= md;
    }
    let d = remaining + 1;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y, m, d, hours, minutes, seconds
    )
}

fn is_leap(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Derive the event log path for a plan.
pub fn event_log_path(state_dir: &Path, plan: &str) -> PathBuf {
    state_dir.join(plan).join("events.jsonl")
}

/// Append an event to the plan's event log.
pub fn append_event(state_dir: &Path, plan: &str, event: ProvenanceEvent) -> LaunchResult<()> {
    let path = event_log_path(state_dir, plan);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            LaunchError::Runtime(format!("cannot create state dir {}: {}", parent.display(), e))
        })?;
    }

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te)
        .map_err(|e| LaunchError::Runtime(format!("JSON serialize error: {}", e)))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            LaunchError::Runtime(format!("cannot open event log {}: {}", path.display(), e))
        })?;

    writeln!(file, "{}", json).map_err(|e| LaunchError::Runtime(format!("write error: {}", e)))?;

    Ok(())
}

/// Read back every event of a plan's log (empty when absent).
pub fn read_events(state_dir: &Path, plan: &str) -> LaunchResult<Vec<TimestampedEvent>> {
    let path = event_log_path(state_dir, plan);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| LaunchError::Runtime(format!("cannot read {}: {}", path.display(), e)))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l)
                .map_err(|e| LaunchError::Runtime(format!("bad event in {}: {}", path.display(), e)))
        })
        .collect()
}
