//! Domain models for the genetics service.

pub mod chat;
pub mod genetics;

pub use chat::{ChatReply, ChatRequest, Role, Transcript, Turn, HISTORY_WINDOW};
pub use genetics::{GeneSummary, InheritancePatternCount, StudiedGene, TraitSummary};
