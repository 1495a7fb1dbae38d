//! Translation lifecycle orchestration.

mod orchestrator;

pub use orchestrator::{
    FormatParams, JobOutcome, ResourceRef, StartedTranslation, TranslationOrchestrator,
};
