pub mod block;
pub mod record;
pub mod score;

pub use block::{parse_blocks, SpeakerKey, TranscriptBlock};
pub use record::{PendingRecord, SessionType, TranscriptRecord};
pub use score::{CandidateDiagnostics, MatchReason, ScoreBreakdown};
