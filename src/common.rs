/**
 * Definitions used by several modules: the error types and the structs that hold
 * command-line arguments.
 */
use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = ::std::result::Result<T, VocabError>;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("could not find word with id '{0}'")]
    WordNotFound(Uuid),
    #[error("'{0}' is already in the word list")]
    DuplicateHeadword(String),
    #[error("invalid word ({0})")]
    InvalidWord(String),
    #[error("invalid input ({0})")]
    InvalidInput(String),
    #[error("invalid configuration ({0})")]
    InvalidConfig(String),
    #[error("could not parse JSON ({0})")]
    Json(#[from] serde_json::Error),
    #[error("cannot write to file '{}' ({source})", .path.to_string_lossy())]
    CannotWriteToFile { path: PathBuf, source: io::Error },
    #[error("IO error ({0})")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// A bulk update stopped at `headword`. Updates made before it are kept.
    #[error("stopped at '{headword}': {source}")]
    BulkUpdate {
        word_id: Uuid,
        headword: String,
        source: ServiceError,
    },
    #[error("interrupted")]
    ReadlineInterrupted,
}

/// Failures of the language-model services. None of these ever leave a word changed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("request failed{} ({message})", status_suffix(.code))]
    TransportFailure { code: Option<u16>, message: String },
    #[error("unexpected response ({0})")]
    InvalidResponse(String),
    #[error("could not parse response ({0})")]
    ParseFailure(String),
}

fn status_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" with status {}", c)).unwrap_or_default()
}

pub fn is_broken_pipe(e: &VocabError) -> bool {
    if let VocabError::Io(e) = e {
        e.kind() == io::ErrorKind::BrokenPipe
    } else {
        false
    }
}

/// Holds the command-line configuration for the application.
#[derive(Parser)]
#[command(name = "vocab", about = "Drill vocabulary with spaced repetition.")]
pub struct Options {
    /// Keep the word list and configuration in a particular directory.
    #[arg(short = 'd', long = "directory", env = "VOCAB_DIR")]
    pub directory: Option<PathBuf>,
    /// Do not emit colorized output.
    #[arg(long = "no-color")]
    pub no_color: bool,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Study the words that are due, then new words.
    Study(StudyOptions),
    /// Add a word.
    Add(AddOptions),
    /// Edit a word.
    Edit(EditOptions),
    /// Remove a word.
    Rm(RmOptions),
    /// List words, optionally only those matching a search term.
    Ls(LsOptions),
    /// List the words that are due for review.
    Due,
    /// Count words by mastery.
    Stats,
    /// Generate memory tips with the language model.
    Tips(TipsOptions),
    /// Show or change the daily reminder.
    Reminder(ReminderOptions),
    /// Export all words and settings to a backup file.
    Export(PathOptions),
    /// Replace all words and settings with a backup file.
    Import(ImportOptions),
    /// Move a word up one review stage.
    Advance(IdOptions),
    /// Move a word back to the first review stage.
    Reset(IdOptions),
}

#[derive(Args)]
pub struct StudyOptions {
    /// Number of words in the session. Defaults to the configured session size.
    #[arg(short = 'n')]
    pub num_to_study: Option<usize>,
}

/// Content fields shared by `add` and `edit`.
#[derive(Args, Default)]
pub struct WordFields {
    /// The meaning of the word.
    #[arg(short = 'm', long = "meaning")]
    pub meaning: Option<String>,
    /// The language the meaning is written in: 'primary' or 'secondary'.
    #[arg(long = "language")]
    pub language: Option<String>,
    /// One of 'verb', 'noun', 'adjective' or 'other'.
    #[arg(long = "pos")]
    pub part_of_speech: Option<String>,
    /// Plural form, for nouns.
    #[arg(long = "plural")]
    pub plural: Option<String>,
    /// Six comma-separated conjugated forms, for verbs. Leave a slot blank to skip it.
    #[arg(long = "conjugation")]
    pub conjugation: Option<String>,
    /// Four comma-separated forms (masc. sg., fem. sg., masc. pl., fem. pl.), for
    /// adjectives.
    #[arg(long = "forms")]
    pub gender_number_forms: Option<String>,
    /// A memory tip.
    #[arg(long = "tip")]
    pub tip: Option<String>,
}

#[derive(Args)]
pub struct AddOptions {
    /// The word in the language being learned.
    pub headword: String,
    #[command(flatten)]
    pub fields: WordFields,
    /// Fill in the meaning and forms with the language model.
    #[arg(long = "analyze")]
    pub analyze: bool,
}

#[derive(Args)]
pub struct EditOptions {
    /// The id (or a unique prefix of it) of the word to edit.
    pub id: String,
    /// A new headword.
    #[arg(long = "headword")]
    pub headword: Option<String>,
    #[command(flatten)]
    pub fields: WordFields,
    /// Overwrite the content fields with the language model's analysis.
    #[arg(long = "analyze")]
    pub analyze: bool,
}

#[derive(Args)]
pub struct RmOptions {
    pub id: String,
    /// Do not ask for confirmation.
    #[arg(short = 'f', long = "force")]
    pub force: bool,
}

#[derive(Args)]
pub struct LsOptions {
    /// Only list words whose forms or meaning contain this term.
    pub term: Option<String>,
}

#[derive(Args)]
pub struct TipsOptions {
    /// Ids of the words to generate tips for. Defaults to every word without a tip.
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct ReminderOptions {
    /// Reminder time of day, as HH:MM.
    #[arg(long = "time")]
    pub time: Option<String>,
    #[arg(long = "on", conflicts_with = "off")]
    pub on: bool,
    #[arg(long = "off")]
    pub off: bool,
}

#[derive(Args)]
pub struct PathOptions {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ImportOptions {
    pub path: PathBuf,
    /// Do not ask for confirmation.
    #[arg(short = 'f', long = "force")]
    pub force: bool,
}

#[derive(Args)]
pub struct IdOptions {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_message_includes_status() {
        let e = ServiceError::TransportFailure {
            code: Some(401),
            message: String::from("bad key"),
        };
        assert_eq!(e.to_string(), "request failed with status 401 (bad key)");

        let e = ServiceError::TransportFailure {
            code: None,
            message: String::from("timed out"),
        };
        assert_eq!(e.to_string(), "request failed (timed out)");
    }

    #[test]
    fn can_parse_study_options() {
        let options = Options::try_parse_from(["vocab", "study", "-n", "5"]).unwrap();
        match options.cmd {
            Command::Study(study) => assert_eq!(study.num_to_study, Some(5)),
            _ => panic!("expected study command"),
        }
    }

    #[test]
    fn can_parse_add_options() {
        let options = Options::try_parse_from([
            "vocab", "add", "casa", "-m", "house", "--pos", "noun", "--plural", "casas",
        ])
        .unwrap();
        match options.cmd {
            Command::Add(add) => {
                assert_eq!(add.headword, "casa");
                assert_eq!(add.fields.meaning.as_deref(), Some("house"));
                assert_eq!(add.fields.plural.as_deref(), Some("casas"));
                assert!(!add.analyze);
            }
            _ => panic!("expected add command"),
        }
    }
}
