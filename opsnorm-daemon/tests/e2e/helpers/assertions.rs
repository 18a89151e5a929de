//! Output and timing helpers.

use std::path::Path;
use std::time::Duration;

/// Default wait for records to appear.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse every JSON line of the output file. Missing file means no records.
pub fn read_records(path: &Path) -> Vec<serde_json::Value> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("output line is JSON"))
        .collect()
}

/// A shutdown trigger that fires after `delay`.
pub async fn stop_after(delay: Duration) -> anyhow::Result<&'static str> {
    tokio::time::sleep(delay).await;
    Ok("test")
}

/// Wait until `path` exists, polling every 10ms.
///
/// # Panics
///
/// Panics if it does not appear within [`DEFAULT_TIMEOUT`].
pub async fn wait_for_file(path: &Path) {
    let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
    while !path.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
