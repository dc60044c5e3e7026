/**
 * Build the questions asked about a word during a study session.
 *
 * Each word is asked three times per session, once in each of these forms:
 *
 *   Round 0: show the word, choose its meaning
 *   Round 1: show the meaning, choose the word
 *   Round 2: show the meaning, type the word (or a conjugated form of it)
 *
 * Randomness comes from the caller so that tests can fix the outcome.
 */
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use super::word::{normalize, Person, WordRecord};

pub const ROUNDS_PER_WORD: usize = 3;
/// The most incorrect choices offered in a multiple-choice round.
const MAX_DISTRACTORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    MeaningRecognition,
    ProductionRecognition,
    Dictation,
}

impl RoundKind {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RoundKind::MeaningRecognition),
            1 => Some(RoundKind::ProductionRecognition),
            2 => Some(RoundKind::Dictation),
            _ => None,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        *self != RoundKind::Dictation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub word_id: Uuid,
    pub kind: RoundKind,
    pub prompt: String,
    pub answer: String,
    /// Shuffled choices, including `answer` exactly once. Empty for dictation rounds.
    pub choices: Vec<String>,
    /// For dictation of a conjugated form, the grammatical person to conjugate for.
    pub subject: Option<Person>,
}

impl Question {
    /// Return `true` if `response` is correct. A choice must match the answer exactly;
    /// a typed answer only has to match after `normalize`.
    pub fn check(&self, response: &str) -> bool {
        if self.kind.is_multiple_choice() {
            response == self.answer
        } else {
            normalize(response) == normalize(&self.answer)
        }
    }
}

/// Build the question of the given kind for `word`. Incorrect choices are drawn from
/// the other words in `pool`.
pub fn generate_question<R: Rng + ?Sized>(
    word: &WordRecord,
    pool: &[WordRecord],
    kind: RoundKind,
    rng: &mut R,
) -> Question {
    let others = pool.iter().filter(|w| w.id() != word.id());
    match kind {
        RoundKind::MeaningRecognition => {
            let answer = word.meaning.clone();
            let candidates: Vec<&str> = others.map(|w| w.meaning.as_str()).collect();
            Question {
                word_id: word.id(),
                kind,
                prompt: word.headword.clone(),
                choices: build_choices(&answer, &candidates, rng),
                answer,
                subject: None,
            }
        }
        RoundKind::ProductionRecognition => {
            let answer = word.headword.clone();
            let candidates: Vec<&str> = others.map(|w| w.headword.as_str()).collect();
            Question {
                word_id: word.id(),
                kind,
                prompt: word.meaning.clone(),
                choices: build_choices(&answer, &candidates, rng),
                answer,
                subject: None,
            }
        }
        RoundKind::Dictation => {
            let (answer, subject) = choose_dictation_form(word, rng);
            Question {
                word_id: word.id(),
                kind,
                prompt: word.meaning.clone(),
                answer,
                choices: Vec::new(),
                subject,
            }
        }
    }
}

/// Return the correct answer plus up to three distinct distractors, in random order.
pub fn build_choices<R: Rng + ?Sized>(
    answer: &str,
    candidates: &[&str],
    rng: &mut R,
) -> Vec<String> {
    let answer_trimmed = answer.trim();
    let mut seen = HashSet::new();
    let mut distractors = Vec::new();
    for candidate in candidates.iter().map(|c| c.trim()) {
        if candidate.is_empty() || candidate == answer_trimmed {
            continue;
        }
        if seen.insert(candidate) {
            distractors.push(candidate);
        }
    }

    let mut choices: Vec<String> = distractors
        .choose_multiple(rng, MAX_DISTRACTORS)
        .map(|c| c.to_string())
        .collect();
    choices.push(answer.to_string());
    // Shuffle again so that the position of the correct answer is random.
    choices.shuffle(rng);
    choices
}

/// For a conjugated verb, pick one filled-in person at random; otherwise ask for
/// the headword itself.
fn choose_dictation_form<R: Rng + ?Sized>(
    word: &WordRecord,
    rng: &mut R,
) -> (String, Option<Person>) {
    if word.is_verb() {
        if let Some(conjugation) = &word.conjugation {
            let filled = conjugation.filled();
            if let Some((person, form)) = filled.choose(rng) {
                return (form.to_string(), Some(*person));
            }
        }
    }
    (word.headword.clone(), None)
}
