/**
 * The word list and settings, owned by a single `WordStore`.
 *
 * Every mutation goes through a method here, is saved immediately, and returns a
 * `StoreEvent` describing what changed. A mutation that fails, including one whose
 * save fails, leaves the store as it was.
 */
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use super::common::{Result, VocabError};
use super::persistence::{Persistence, Snapshot};
use super::repetition::{self, ReviewOutcome};
use super::selection;
use super::services::{AnalysisResult, TipService};
use super::word::{MasteryStatus, WordDraft, WordRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(Uuid),
    Updated(Uuid),
    Removed(Uuid),
    Reviewed { word_id: Uuid, outcome: ReviewOutcome },
    SettingsChanged,
    /// The whole word list was replaced, e.g. by an import.
    Replaced { words: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub due: usize,
    /// Every mastery status is present, with a count of zero if need be.
    pub by_status: BTreeMap<MasteryStatus, usize>,
}

pub struct WordStore<P: Persistence> {
    persistence: P,
    snapshot: Snapshot,
}

impl<P: Persistence> WordStore<P> {
    pub fn open(persistence: P) -> Result<Self> {
        let snapshot = persistence.load()?;
        debug!("opened store with {} words", snapshot.words.len());
        Ok(WordStore { persistence, snapshot })
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn words(&self) -> &[WordRecord] {
        &self.snapshot.words
    }

    pub fn get(&self, id: Uuid) -> Option<&WordRecord> {
        self.snapshot.words.iter().find(|w| w.id() == id)
    }

    /// Look up a word by the start of its id, as typed on the command line.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&WordRecord> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(VocabError::InvalidInput(String::from("empty id")));
        }
        let mut matches = self
            .snapshot
            .words
            .iter()
            .filter(|w| w.id().to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(word), None) => Ok(word),
            (Some(_), Some(_)) => {
                Err(VocabError::InvalidInput(format!("id '{}' is ambiguous", prefix)))
            }
            (None, _) => {
                Err(VocabError::InvalidInput(format!("no word with id '{}'", prefix)))
            }
        }
    }

    pub fn search(&self, key: &str) -> Vec<&WordRecord> {
        self.snapshot.words.iter().filter(|w| w.matches_search(key)).collect()
    }

    pub fn due(&self, reference: DateTime<Utc>) -> Vec<&WordRecord> {
        selection::due_words(&self.snapshot.words, reference)
    }

    /// The words for a study session, copied so that the session can own them.
    pub fn session_words(
        &self,
        count: usize,
        reference: DateTime<Utc>,
    ) -> Vec<WordRecord> {
        selection::session_words(&self.snapshot.words, count, reference)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn reminder_time(&self) -> DateTime<Utc> {
        self.snapshot.reminder_time
    }

    pub fn reminders_enabled(&self) -> bool {
        self.snapshot.reminders_enabled
    }

    pub fn stats(&self, reference: DateTime<Utc>) -> Stats {
        let mut by_status: BTreeMap<MasteryStatus, usize> =
            MasteryStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for word in self.snapshot.words.iter() {
            *by_status.entry(word.mastery_status()).or_insert(0) += 1;
        }
        Stats {
            total: self.snapshot.words.len(),
            due: self.due(reference).len(),
            by_status,
        }
    }

    pub fn add(&mut self, draft: WordDraft, now: DateTime<Utc>) -> Result<StoreEvent> {
        let word = WordRecord::new(draft, now)?;
        check_duplicate(&self.snapshot.words, &word)?;
        let id = word.id();
        let headword = word.headword.clone();
        self.mutate(|snapshot| {
            snapshot.words.push(word);
            Ok(())
        })?;
        info!("added '{}' ({})", headword, id);
        Ok(StoreEvent::Added(id))
    }

    /// Replace the content of a word. Its review state is kept.
    pub fn update(&mut self, id: Uuid, draft: WordDraft) -> Result<StoreEvent> {
        let mut edited = self.require(id)?.clone();
        edited.apply_draft(draft)?;
        check_duplicate(&self.snapshot.words, &edited)?;
        self.replace_word(edited)?;
        info!("updated {}", id);
        Ok(StoreEvent::Updated(id))
    }

    pub fn remove(&mut self, id: Uuid) -> Result<StoreEvent> {
        self.require(id)?;
        self.mutate(|snapshot| {
            snapshot.words.retain(|w| w.id() != id);
            Ok(())
        })?;
        info!("removed {}", id);
        Ok(StoreEvent::Removed(id))
    }

    pub fn set_memory_tip(
        &mut self,
        id: Uuid,
        tip: Option<&str>,
    ) -> Result<StoreEvent> {
        let mut word = self.require(id)?.clone();
        word.set_memory_tip(tip);
        self.replace_word(word)?;
        debug!("set memory tip of {}", id);
        Ok(StoreEvent::Updated(id))
    }

    /// Overwrite a word's content with an analysis. The memory tip and review
    /// state are kept.
    pub fn apply_analysis(
        &mut self,
        id: Uuid,
        analysis: AnalysisResult,
    ) -> Result<StoreEvent> {
        let word = self.require(id)?;
        let draft = analysis.into_draft(&word.headword, word.memory_tip.clone());
        self.update(id, draft)
    }

    pub fn record_session_result(
        &mut self,
        id: Uuid,
        errors: u32,
        now: DateTime<Utc>,
    ) -> Result<StoreEvent> {
        self.review(id, |word| repetition::apply_session_result(word, errors, now))
    }

    pub fn advance(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<StoreEvent> {
        self.review(id, |word| repetition::advance(word, now))
    }

    pub fn reset(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<StoreEvent> {
        self.review(id, |word| repetition::reset(word, now))
    }

    pub fn set_reminder(
        &mut self,
        time: DateTime<Utc>,
        enabled: bool,
    ) -> Result<StoreEvent> {
        self.mutate(|snapshot| {
            snapshot.reminder_time = time;
            snapshot.reminders_enabled = enabled;
            Ok(())
        })?;
        info!("reminder set to {} ({})", time, if enabled { "on" } else { "off" });
        Ok(StoreEvent::SettingsChanged)
    }

    /// Generate and save a memory tip for each word in `ids`, in order.
    ///
    /// Each tip is saved as soon as it arrives. The first failure stops the run
    /// with `VocabError::BulkUpdate`, naming the word it failed on; tips saved
    /// before it are kept.
    pub fn refresh_tips<S: TipService + ?Sized>(
        &mut self,
        ids: &[Uuid],
        service: &S,
    ) -> Result<Vec<StoreEvent>> {
        let mut events = Vec::with_capacity(ids.len());
        for id in ids.iter() {
            let word = self.require(*id)?;
            let tips = match service.generate_tips(word) {
                Ok(tips) => tips,
                Err(source) => {
                    warn!(
                        "tip generation stopped at '{}' after {} updates",
                        word.headword,
                        events.len()
                    );
                    return Err(VocabError::BulkUpdate {
                        word_id: *id,
                        headword: word.headword.clone(),
                        source,
                    });
                }
            };
            events.push(self.set_memory_tip(*id, Some(&tips.tips))?);
        }
        Ok(events)
    }

    /// Replace every word and setting with `snapshot`.
    ///
    /// A backup that repeats an id, or holds two words that would fail the
    /// duplicate check, is rejected whole and the store is left as it was.
    pub fn import(&mut self, snapshot: Snapshot) -> Result<StoreEvent> {
        check_backup(&snapshot.words)?;
        let words = snapshot.words.len();
        self.mutate(|current| {
            *current = snapshot;
            Ok(())
        })?;
        info!("imported {} words", words);
        Ok(StoreEvent::Replaced { words })
    }

    fn require(&self, id: Uuid) -> Result<&WordRecord> {
        self.get(id).ok_or(VocabError::WordNotFound(id))
    }

    fn review<F>(&mut self, id: Uuid, f: F) -> Result<StoreEvent>
    where
        F: FnOnce(&mut WordRecord) -> ReviewOutcome,
    {
        let mut word = self.require(id)?.clone();
        let outcome = f(&mut word);
        self.replace_word(word)?;
        debug!(
            "{} moved from stage {} to {}",
            id, outcome.previous_stage, outcome.stage
        );
        Ok(StoreEvent::Reviewed { word_id: id, outcome })
    }

    fn replace_word(&mut self, word: WordRecord) -> Result<()> {
        let id = word.id();
        self.mutate(move |snapshot| {
            let slot = snapshot
                .words
                .iter_mut()
                .find(|w| w.id() == id)
                .ok_or(VocabError::WordNotFound(id))?;
            *slot = word;
            Ok(())
        })
    }

    /// Apply `f` to a copy of the snapshot and save it. The copy only takes the
    /// place of the current snapshot once the save has succeeded.
    fn mutate<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot) -> Result<()>,
    {
        let mut next = self.snapshot.clone();
        f(&mut next)?;
        self.persistence.save(&next)?;
        self.snapshot = next;
        Ok(())
    }
}

fn check_duplicate(words: &[WordRecord], candidate: &WordRecord) -> Result<()> {
    let conflict = words
        .iter()
        .filter(|w| w.id() != candidate.id())
        .find(|w| w.conflicts_with(candidate));
    match conflict {
        Some(existing) => Err(VocabError::DuplicateHeadword(existing.headword.clone())),
        None => Ok(()),
    }
}

fn check_backup(words: &[WordRecord]) -> Result<()> {
    let mut accepted: Vec<&WordRecord> = Vec::with_capacity(words.len());
    for word in words.iter() {
        if accepted.iter().any(|w| w.id() == word.id()) {
            return Err(VocabError::InvalidInput(format!(
                "backup has two words with id '{}'",
                word.id()
            )));
        }
        if let Some(existing) = accepted.iter().find(|w| w.conflicts_with(word)) {
            return Err(VocabError::InvalidInput(format!(
                "backup word '{}' duplicates '{}'",
                word.headword, existing.headword
            )));
        }
        accepted.push(word);
    }
    Ok(())
}
