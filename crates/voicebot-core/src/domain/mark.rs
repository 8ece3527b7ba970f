//! Audio marks and derived segments (§3, §4.9).

use serde::{Deserialize, Serialize};

/// Kind of audio mark emitted onto a session's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkType {
    RecordingStart,
    ListenStart,
    DeltaActivity,
    CompletedChunk,
    IntentFinalized,
    Timeout,
}

/// Append-only mark on a session's audio timeline (§3 "Audio Mark").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMark {
    pub linked_id: String,
    pub offset_ms: u64,
    pub mark_type: MarkType,
    pub reason: Option<String>,
    pub meta: serde_json::Value,
    pub ts_ms: i64,
}

/// A derived segment between a `ListenStart` and its closing
/// `IntentFinalized`, or an open-ended partial segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    pub reason: String,
}

/// Convert an ordered, non-decreasing mark sequence into segments (§4.9).
///
/// A `ListenStart` opens a segment; the next `IntentFinalized` closes it.
/// Any `ListenStart` left open at the end of the sequence yields a partial
/// segment: `reason = "active"` if it is the very last mark, `"incomplete"`
/// if later marks exist without a closing `IntentFinalized`.
#[must_use]
pub fn resolve_audio_segments(marks: &[AudioMark]) -> Vec<AudioSegment> {
    let mut segments = Vec::new();
    let mut open_start: Option<u64> = None;

    for (idx, mark) in marks.iter().enumerate() {
        match mark.mark_type {
            MarkType::ListenStart => {
                open_start = Some(mark.offset_ms);
            }
            MarkType::IntentFinalized => {
                if let Some(start) = open_start.take() {
                    segments.push(AudioSegment {
                        start_ms: start,
                        end_ms: Some(mark.offset_ms),
                        reason: "completed".to_string(),
                    });
                }
            }
            _ => {
                if open_start.is_some() && idx == marks.len() - 1 {
                    // Last mark in the sequence isn't a finalizer: leave open.
                }
            }
        }
    }

    if let Some(start) = open_start {
        let is_last_mark = marks
            .last()
            .is_some_and(|m| matches!(m.mark_type, MarkType::ListenStart) && m.offset_ms == start);
        segments.push(AudioSegment {
            start_ms: start,
            end_ms: None,
            reason: if is_last_mark { "active" } else { "incomplete" }.to_string(),
        });
    }

    segments
}

/// Mark-monotonicity check used by tests and the orchestrator's assertions
/// (§8 property 8).
#[must_use]
pub fn marks_are_monotonic(marks: &[AudioMark]) -> bool {
    marks.windows(2).all(|w| w[0].offset_ms <= w[1].offset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(offset_ms: u64, t: MarkType) -> AudioMark {
        AudioMark {
            linked_id: "call-1".into(),
            offset_ms,
            mark_type: t,
            reason: None,
            meta: serde_json::Value::Null,
            ts_ms: 0,
        }
    }

    #[test]
    fn closed_pair_yields_completed_segment() {
        let marks = vec![
            mark(100, MarkType::ListenStart),
            mark(2500, MarkType::IntentFinalized),
        ];
        let segments = resolve_audio_segments(&marks);
        assert_eq!(segments, vec![AudioSegment { start_ms: 100, end_ms: Some(2500), reason: "completed".into() }]);
    }

    #[test]
    fn open_listen_start_at_end_is_active() {
        let marks = vec![mark(100, MarkType::ListenStart)];
        let segments = resolve_audio_segments(&marks);
        assert_eq!(segments, vec![AudioSegment { start_ms: 100, end_ms: None, reason: "active".into() }]);
    }

    #[test]
    fn open_listen_start_with_trailing_marks_is_incomplete() {
        let marks = vec![
            mark(100, MarkType::ListenStart),
            mark(400, MarkType::DeltaActivity),
            mark(900, MarkType::Timeout),
        ];
        let segments = resolve_audio_segments(&marks);
        assert_eq!(segments, vec![AudioSegment { start_ms: 100, end_ms: None, reason: "incomplete".into() }]);
    }

    #[test]
    fn monotonic_sequence_passes() {
        let marks = vec![mark(0, MarkType::RecordingStart), mark(10, MarkType::ListenStart)];
        assert!(marks_are_monotonic(&marks));
    }

    #[test]
    fn decreasing_offset_fails_monotonicity() {
        let marks = vec![mark(10, MarkType::RecordingStart), mark(5, MarkType::ListenStart)];
        assert!(!marks_are_monotonic(&marks));
    }
}
