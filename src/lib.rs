/**
 * A vocabulary trainer: words with their grammatical forms, drilled by spaced
 * repetition in short multiple-choice and dictation sessions.
 */
#[macro_use]
pub mod iohelper;
pub mod common;
pub mod config;
pub mod persistence;
pub mod quiz;
pub mod repetition;
pub mod selection;
pub mod services;
pub mod session;
pub mod store;
pub mod ui;
pub mod word;

pub use common::{Result, ServiceError, VocabError};
pub use persistence::{JsonFileStore, MemoryStore, Persistence, Snapshot};
pub use quiz::{Question, RoundKind};
pub use session::{Feedback, StudySession, WordCompleted};
pub use store::{Stats, StoreEvent, WordStore};
pub use word::{MasteryStatus, PartOfSpeech, WordDraft, WordRecord};
