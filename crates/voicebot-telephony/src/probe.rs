//! Materialization probe and pin-retry protocol (§4.1).
//!
//! Both are plain polling loops against [`crate::rest::RestClient`]; kept
//! out of `client.rs` so the retry/backoff shape is easy to eyeball on its
//! own.

use std::time::{Duration, Instant};
use tracing::debug;
use voicebot_core::ports::TelephonyError;

use crate::error::TransportError;
use crate::rest::RestClient;

const PROBE_INTERVAL: Duration = Duration::from_millis(50);
const PIN_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Polls `channel_id`'s state every 50ms until it reports `Up` or `timeout`
/// elapses (§4.1 "materialization probe").
pub async fn wait_for_audio_plane_ready(rest: &RestClient, channel_id: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match rest.channel_state(channel_id).await {
            Ok(state) if state.eq_ignore_ascii_case("Up") => return true,
            Ok(state) => debug!(channel_id, state, "waiting for audio plane materialization"),
            Err(err) => debug!(channel_id, error = %err, "materialization probe query failed"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(PROBE_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}

/// Retries `addChannel` with 100ms back-off on `NotFound`/`400` up to
/// `max_retries` times (§4.1 "defeats orphan-GC of ephemeral snoop
/// channels").
pub async fn pin_snoop_to_bridge(
    rest: &RestClient,
    bridge_id: &str,
    channel_id: &str,
    max_retries: u32,
) -> Result<(), TelephonyError> {
    let mut attempt = 0;
    loop {
        match rest.add_channel_to_bridge(bridge_id, channel_id).await {
            Ok(()) => return Ok(()),
            Err(TransportError::NotFound(_) | TransportError::Conflict(_)) if attempt < max_retries => {
                attempt += 1;
                debug!(bridge_id, channel_id, attempt, "retrying snoop pin");
                tokio::time::sleep(PIN_RETRY_BACKOFF).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
