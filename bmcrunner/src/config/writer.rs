//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::duration::format_duration;
use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let capacity = config
        .repository
        .capacity
        .map(|c| c.to_string())
        .unwrap_or_default();

    format!(
        r#"[runner]
; Maximum number of BMCs operated on at the same time (default: 1000).
; Each BMC is served by at most one worker; this bounds workers fleet-wide.
max_workers = {}
; How long a per-BMC worker waits for more work before exiting (default: 30s)
; Supports: ms, s, m suffixes (e.g., 500ms, 30s, 2m). Bare numbers are seconds.
worker_idle_timeout = {}
; Interval between runner status reports in the debug log (default: 3s)
reporter_interval = {}

[repository]
; Maximum number of task status records kept (default: 100000).
; The oldest record is evicted first. Leave empty to keep every record.
capacity = {}

[logging]
; Log file path. Truncated at the start of each session.
file = {}
"#,
        config.runner.max_workers,
        format_duration(config.runner.worker_idle_timeout),
        format_duration(config.runner.reporter_interval),
        capacity,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
