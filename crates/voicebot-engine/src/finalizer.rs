//! Post-Call Finalizer (C10, §4.10): runs once at `StasisEnd`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};
use voicebot_core::domain::{Role, Session};
use voicebot_core::ports::{CallLogSinkPort, CallRecord};

/// Delay before copying the switch's master recording, to let it finish
/// closing the file (§4.10).
const MASTER_RECORDING_COPY_DELAY: Duration = Duration::from_millis(500);

pub struct FinalizerDeps {
    pub call_log: Arc<dyn CallLogSinkPort>,
    pub voicebot_audio_path: PathBuf,
}

pub struct Finalizer {
    deps: FinalizerDeps,
}

fn sanitize(component: &str) -> String {
    component.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}

impl Finalizer {
    #[must_use]
    pub fn new(deps: FinalizerDeps) -> Self {
        Self { deps }
    }

    /// `{linkedId}_{identityOrUnknown}_{caller}_{unixTime}` (§4.10).
    #[must_use]
    pub fn final_basename(&self, session: &Session, identity: Option<&str>, unix_time: i64) -> String {
        format!(
            "{}_{}_{}_{}",
            sanitize(&session.linked_id),
            sanitize(identity.unwrap_or("unknown")),
            sanitize(&session.caller),
            unix_time
        )
    }

    fn call_dir(&self, session: &Session, day: &str) -> PathBuf {
        self.deps.voicebot_audio_path.join(sanitize(&session.callee)).join(day)
    }

    /// Writes the `{role, content}` conversation log next to the final WAV
    /// name, one line per turn.
    async fn write_transcript(&self, dir: &Path, basename: &str, session: &Session) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{basename}_conversation_log.txt"));
        let mut body = String::new();
        for turn in &session.history {
            let prefix = match turn.role {
                Role::User => "👤 Usuario",
                Role::Assistant => "🤖 Asistente",
            };
            body.push_str(&format!("{prefix}: {}\n", turn.content));
        }
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    /// Copies the switch's mixed master recording into the final directory,
    /// falling back to the ARI per-channel recording if no master is present.
    async fn place_recording(&self, dir: &Path, basename: &str, master_recording_path: Option<&Path>, ari_recording_path: Option<&Path>) -> std::io::Result<Option<PathBuf>> {
        let dest = dir.join(format!("{basename}.wav"));
        if let Some(master) = master_recording_path {
            sleep(MASTER_RECORDING_COPY_DELAY).await;
            tokio::fs::copy(master, &dest).await?;
            return Ok(Some(dest));
        }
        if let Some(ari) = ari_recording_path {
            warn!(call = %basename, "no mixed master recording, falling back to the ARI recording");
            tokio::fs::copy(ari, &dest).await?;
            return Ok(Some(dest));
        }
        warn!(call = %basename, "no recording of any kind found to finalize");
        Ok(None)
    }

    /// Runs the full finalization sequence for one call.
    pub async fn finalize(
        &self,
        session: &Session,
        identity: Option<&str>,
        now_ms: i64,
        day: &str,
        master_recording_path: Option<&Path>,
        ari_recording_path: Option<&Path>,
    ) {
        let unix_time = now_ms / 1000;
        let basename = self.final_basename(session, identity, unix_time);
        let dir = self.call_dir(session, day);

        let transcript_path = match self.write_transcript(&dir, &basename, session).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(call = %session.linked_id, error = %err, "failed to write conversation transcript");
                None
            }
        };

        let recording_path = match self.place_recording(&dir, &basename, master_recording_path, ari_recording_path).await {
            Ok(path) => path,
            Err(err) => {
                warn!(call = %session.linked_id, error = %err, "failed to finalize recording");
                None
            }
        };

        let summary = session.summary(now_ms);
        let record = CallRecord {
            linked_id: session.linked_id.clone(),
            caller: session.caller.clone(),
            callee: session.callee.clone(),
            bot_name: session.bot_name.clone(),
            identity: identity.map(str::to_string),
            turns: summary.turns,
            successful_turns: summary.successful_turns,
            total_silences: summary.total_silences,
            duration_seconds: summary.duration_seconds,
            recording_path: recording_path.map(|p| p.to_string_lossy().into_owned()),
            transcript_path: transcript_path.map(|p| p.to_string_lossy().into_owned()),
            ended_at_ms: now_ms,
        };

        if let Err(err) = self.deps.call_log.persist(record).await {
            warn!(call = %session.linked_id, error = %err, "failed to persist call record");
        } else {
            info!(call = %session.linked_id, "call finalized");
        }
    }
}
