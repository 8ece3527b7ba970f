//! Pure-domain session engine (C3–C6, C9, C10): phase manager, resource
//! contracts, turn-level policies, the turn orchestrator, recording
//! segmenter, and post-call finalizer. Depends only on `voicebot-core`
//! port traits — no adapter crate is linked here.

pub mod audio_staging;
pub mod finalizer;
pub mod phase_manager;
pub mod policies;
pub mod recording_segmenter;
pub mod resource_contracts;
pub mod turn_orchestrator;

pub use audio_staging::AudioStager;
pub use finalizer::{Finalizer, FinalizerDeps};
pub use phase_manager::{PhaseManager, TransitionOutcome, TransitionReason};
pub use recording_segmenter::{AudioMarkLog, RecordingSegmenter};
pub use resource_contracts::SnoopContracts;
pub use turn_orchestrator::{EngineOutcome, TurnOrchestrator, TurnOrchestratorDeps};
