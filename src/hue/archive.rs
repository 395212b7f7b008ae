//! Best-effort archive of raw bridge response bodies for offline analysis.
//! Failures are logged and swallowed; archiving must never interrupt a poll.

use tokio::fs;
use tracing::{debug, warn};

/// Write `bytes` to `bridge_responses/{endpoint}/{timestamp}.json`.
pub async fn save(endpoint: &str, bytes: &[u8]) {
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let dir = format!("bridge_responses/{endpoint}");
    let path = format!("{dir}/{ts}.json");

    if let Err(e) = fs::create_dir_all(&dir).await {
        warn!(path = %path, error = %e, "archive: failed to create directory");
        return;
    }

    if let Err(e) = fs::write(&path, bytes).await {
        warn!(path = %path, error = %e, "archive: failed to write response body");
    } else {
        debug!(path = %path, bytes = bytes.len(), "archive: saved bridge response");
    }
}
