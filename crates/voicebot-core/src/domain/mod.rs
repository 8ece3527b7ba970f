//! Core domain types (§3). Pure data plus the small amount of behavior that
//! needs no port/adapter dependency.

pub mod contract;
pub mod lifecycle;
pub mod mark;
pub mod phase;
pub mod session;
pub mod snoop;

pub use contract::{BusinessState, DomainAction, DomainContext, DomainResult, InterruptPolicy};
pub use lifecycle::{Action, LifecycleContractEntry, LifecycleTable};
pub use mark::{resolve_audio_segments, marks_are_monotonic, AudioMark, AudioSegment, MarkType};
pub use phase::{Phase, PhaseKind, PhaseTable};
pub use session::{LastSpoken, Role, Session, SessionSummary, Turn};
pub use snoop::{SnoopContract, SnoopState, SnoopTransitionError};
