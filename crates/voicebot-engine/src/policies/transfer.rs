//! Transfer Detector (C6, §4.6): phrase-triggered handoff to a human queue
//! via dialplan transfer.
//!
//! Kept as a regex table behind this struct rather than inlined into the
//! orchestrator, so a domain package can substitute its own classifier
//! without touching the engine (§9 "isolate behind Classifier interfaces").

use regex::RegexSet;
use std::sync::LazyLock;

const TRANSFER_PATTERNS: &[&str] = &[
    r"hablar con (?:un|una) (?:persona|ejecutivo|agente)",
    r"\brepresentante\b",
    r"agente humano",
    r"\boperador(a)?\b",
];

static TRANSFER_PATTERN_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(TRANSFER_PATTERNS).expect("TRANSFER_PATTERNS is a fixed literal table"));

#[derive(Debug, Clone)]
pub struct TransferDetector {
    pub queue: String,
}

impl TransferDetector {
    #[must_use]
    pub fn new(queue: impl Into<String>) -> Self {
        Self { queue: queue.into() }
    }

    /// Whether `text` (a caller utterance) requests a human transfer.
    #[must_use]
    pub fn requests_transfer(&self, text: &str) -> bool {
        TRANSFER_PATTERN_SET.is_match(&text.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_request_for_a_human() {
        let detector = TransferDetector::new("support");
        assert!(detector.requests_transfer("quiero hablar con una persona por favor"));
    }

    #[test]
    fn detects_operator_request() {
        let detector = TransferDetector::new("support");
        assert!(detector.requests_transfer("necesito un operador"));
    }

    #[test]
    fn ordinary_text_does_not_trigger_transfer() {
        let detector = TransferDetector::new("support");
        assert!(!detector.requests_transfer("mi nombre es Juan Pérez"));
    }
}
