/**
 * The state machine for one study session.
 *
 * Every word in the session is asked `ROUNDS_PER_WORD` times. Words take turns: after
 * a round of one word, the session moves on to the next word in the list that still
 * has rounds left, wrapping around at the end. When a word's last round is done, the
 * number of mistakes made on it is handed back to the caller as a `WordCompleted`,
 * which is then recorded with `repetition::apply_session_result`.
 */
use log::debug;
use rand::Rng;
use uuid::Uuid;

use super::quiz::{generate_question, Question, RoundKind, ROUNDS_PER_WORD};
use super::word::WordRecord;

#[derive(Debug, Clone)]
struct SessionEntry {
    word: WordRecord,
    rounds_completed: usize,
    errors: u32,
}

impl SessionEntry {
    fn is_active(&self) -> bool {
        self.rounds_completed < ROUNDS_PER_WORD
    }
}

#[derive(Debug, Clone)]
struct Pending {
    index: usize,
    question: Question,
    /// `Some(correct)` once the question has been answered.
    answered: Option<bool>,
}

/// What the user is told after answering.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub correct: bool,
    pub answer: String,
}

/// Emitted when a word has been through all of its rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordCompleted {
    pub word_id: Uuid,
    pub errors: u32,
}

#[derive(Debug, Clone)]
pub struct StudySession {
    entries: Vec<SessionEntry>,
    cursor: usize,
    pending: Option<Pending>,
}

impl StudySession {
    /// Start a session over `words`, in the order given. An empty list gives a session
    /// that is already complete.
    pub fn new(words: Vec<WordRecord>) -> Self {
        let entries = words
            .into_iter()
            .map(|word| SessionEntry { word, rounds_completed: 0, errors: 0 })
            .collect();
        StudySession { entries, cursor: 0, pending: None }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| !e.is_active())
    }

    /// Number of words that have been through all their rounds.
    pub fn words_completed(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_active()).count()
    }

    /// The word the current question is about.
    pub fn current_word(&self) -> Option<&WordRecord> {
        self.pending.as_ref().map(|p| &self.entries[p.index].word)
    }

    /// Return the question to ask now, generating one if needed. The same question is
    /// returned until it has been answered and `advance` has been called. `None` means
    /// the session is complete.
    ///
    /// Incorrect choices are drawn from `pool`, which is usually every word in the
    /// store rather than only those in the session.
    pub fn next_question<R: Rng + ?Sized>(
        &mut self,
        pool: &[WordRecord],
        rng: &mut R,
    ) -> Option<&Question> {
        if self.pending.is_none() {
            let index = self.find_active()?;
            let entry = &self.entries[index];
            let kind = RoundKind::from_index(entry.rounds_completed)?;
            let question = generate_question(&entry.word, pool, kind, rng);
            self.pending = Some(Pending { index, question, answered: None });
        }
        self.pending.as_ref().map(|p| &p.question)
    }

    /// Check a response to the current question. Returns `None` if there is no
    /// question waiting for an answer, including when the current one has already
    /// been answered.
    pub fn submit(&mut self, response: &str) -> Option<Feedback> {
        let pending = self.pending.as_mut()?;
        if pending.answered.is_some() {
            return None;
        }

        let correct = pending.question.check(response);
        pending.answered = Some(correct);
        if !correct {
            self.entries[pending.index].errors += 1;
        }
        Some(Feedback { correct, answer: pending.question.answer.clone() })
    }

    /// Finish the current round after it has been answered and move on to the next
    /// word. Returns the word's result if that was its last round.
    pub fn advance(&mut self) -> Option<WordCompleted> {
        match &self.pending {
            Some(p) if p.answered.is_some() => {}
            _ => return None,
        }
        let pending = self.pending.take()?;

        let len = self.entries.len();
        let entry = &mut self.entries[pending.index];
        entry.rounds_completed = (entry.rounds_completed + 1).min(ROUNDS_PER_WORD);
        self.cursor = (pending.index + 1) % len;

        if entry.rounds_completed == ROUNDS_PER_WORD {
            debug!("finished '{}' with {} errors", entry.word.headword, entry.errors);
            let completed = WordCompleted {
                word_id: entry.word.id(),
                errors: entry.errors,
            };
            entry.errors = 0;
            Some(completed)
        } else {
            None
        }
    }

    /// Starting from the cursor and wrapping around, find a word with rounds left.
    fn find_active(&self) -> Option<usize> {
        let len = self.entries.len();
        (0..len)
            .map(|offset| (self.cursor + offset) % len)
            .find(|i| self.entries[*i].is_active())
    }
}
