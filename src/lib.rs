pub mod attribution;
pub mod config;
pub mod models;
pub mod output;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod text;

pub use attribution::{
    attribute_and_render, speaker_hints_from_json, AttributionContext, RenderedTranscript,
};
pub use config::{ConsolidationConfig, IdentityConfig, MatchConfig, Weights};
pub use models::{
    parse_blocks, CandidateDiagnostics, MatchReason, PendingRecord, ScoreBreakdown, SessionType,
    SpeakerKey, TranscriptBlock, TranscriptRecord,
};
pub use output::{
    inject_summary_backlink, sanitize_filename, write_transcript_file, TranscriptDoc,
};
pub use scoring::{derive_participants, score_candidate, ScoreContext};
pub use selector::{select_best, Selection};
pub use store::{
    DirOverrideStore, DirPendingStore, JsonRecordStore, OverrideStore, PendingStore, RecordStore,
    StoreError,
};
