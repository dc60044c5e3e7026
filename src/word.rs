/**
 * The vocabulary word record, its grammatical forms, and the views derived from it:
 * accepted variants, search matching and mastery status.
 *
 * Every `WordRecord` is built through `WordRecord::new` or `WordRecord::from_stored`,
 * which trim the content fields, normalize the memory tip and recompute the schedule,
 * so the rest of the crate can rely on those invariants holding.
 */
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::common::{Result, VocabError};
use super::repetition;

/// Every non-empty memory tip starts with this label.
pub const MEMORY_TIP_PREFIX: &str = "Memory tip: ";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Verb,
    Noun,
    Adjective,
    Other,
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "verb" | "v" => Some(PartOfSpeech::Verb),
            "noun" | "n" => Some(PartOfSpeech::Noun),
            "adjective" | "adj" => Some(PartOfSpeech::Adjective),
            "other" => Some(PartOfSpeech::Other),
            _ => None,
        }
    }
}

impl Default for PartOfSpeech {
    fn default() -> Self {
        PartOfSpeech::Other
    }
}

/// The language a meaning is written in. The display names of the two languages come
/// from the configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MeaningLanguage {
    Primary,
    Secondary,
}

impl MeaningLanguage {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Some(MeaningLanguage::Primary),
            "secondary" => Some(MeaningLanguage::Secondary),
            _ => None,
        }
    }
}

impl Default for MeaningLanguage {
    fn default() -> Self {
        MeaningLanguage::Primary
    }
}

/// The six grammatical persons of a verb conjugation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Person {
    FirstSingular,
    SecondSingular,
    ThirdSingular,
    FirstPlural,
    SecondPlural,
    ThirdPlural,
}

impl Person {
    pub const ALL: [Person; 6] = [
        Person::FirstSingular,
        Person::SecondSingular,
        Person::ThirdSingular,
        Person::FirstPlural,
        Person::SecondPlural,
        Person::ThirdPlural,
    ];

    /// The subject pronoun shown as a hint in dictation rounds.
    pub fn label(&self) -> &'static str {
        match self {
            Person::FirstSingular => "yo",
            Person::SecondSingular => "tú",
            Person::ThirdSingular => "él/ella",
            Person::FirstPlural => "nosotros",
            Person::SecondPlural => "vosotros",
            Person::ThirdPlural => "ellos/ellas",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Conjugation {
    pub yo: String,
    pub tu: String,
    pub el: String,
    pub nosotros: String,
    pub vosotros: String,
    pub ellos: String,
}

impl Conjugation {
    pub fn get(&self, person: Person) -> &str {
        match person {
            Person::FirstSingular => &self.yo,
            Person::SecondSingular => &self.tu,
            Person::ThirdSingular => &self.el,
            Person::FirstPlural => &self.nosotros,
            Person::SecondPlural => &self.vosotros,
            Person::ThirdPlural => &self.ellos,
        }
    }

    /// The persons whose form is filled in, paired with the form, in person order.
    pub fn filled(&self) -> Vec<(Person, &str)> {
        Person::ALL
            .iter()
            .map(|p| (*p, self.get(*p).trim()))
            .filter(|(_, form)| !form.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filled().is_empty()
    }

    fn trimmed(&self) -> Self {
        Conjugation {
            yo: self.yo.trim().to_string(),
            tu: self.tu.trim().to_string(),
            el: self.el.trim().to_string(),
            nosotros: self.nosotros.trim().to_string(),
            vosotros: self.vosotros.trim().to_string(),
            ellos: self.ellos.trim().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct GenderNumberForms {
    pub masculine_singular: String,
    pub feminine_singular: String,
    pub masculine_plural: String,
    pub feminine_plural: String,
}

impl GenderNumberForms {
    pub fn forms(&self) -> [&str; 4] {
        [
            &self.masculine_singular,
            &self.feminine_singular,
            &self.masculine_plural,
            &self.feminine_plural,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.forms().iter().all(|f| f.trim().is_empty())
    }

    fn trimmed(&self) -> Self {
        GenderNumberForms {
            masculine_singular: self.masculine_singular.trim().to_string(),
            feminine_singular: self.feminine_singular.trim().to_string(),
            masculine_plural: self.masculine_plural.trim().to_string(),
            feminine_plural: self.feminine_plural.trim().to_string(),
        }
    }
}

/// How well a word is known, derived from its review state.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MasteryStatus {
    Unseen,
    Learning,
    Fuzzy,
    Familiar,
    Mastered,
}

impl MasteryStatus {
    pub const ALL: [MasteryStatus; 5] = [
        MasteryStatus::Unseen,
        MasteryStatus::Learning,
        MasteryStatus::Fuzzy,
        MasteryStatus::Familiar,
        MasteryStatus::Mastered,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MasteryStatus::Unseen => "unseen",
            MasteryStatus::Learning => "learning",
            MasteryStatus::Fuzzy => "fuzzy",
            MasteryStatus::Familiar => "familiar",
            MasteryStatus::Mastered => "mastered",
        }
    }
}

/// The user-editable content of a word, without identity or review state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordDraft {
    pub headword: String,
    pub meaning: String,
    pub meaning_language: MeaningLanguage,
    pub part_of_speech: PartOfSpeech,
    pub conjugation: Option<Conjugation>,
    pub plural_form: Option<String>,
    pub gender_number_forms: Option<GenderNumberForms>,
    pub memory_tip: Option<String>,
}

impl WordDraft {
    pub fn new(headword: &str, meaning: &str) -> Self {
        WordDraft {
            headword: String::from(headword),
            meaning: String::from(meaning),
            ..WordDraft::default()
        }
    }

    /// Trim every field, drop empty optional forms and prefix the memory tip.
    fn normalized(self) -> Result<WordDraft> {
        let headword = self.headword.trim().to_string();
        if headword.is_empty() {
            return Err(VocabError::InvalidWord(String::from("headword is empty")));
        }

        Ok(WordDraft {
            headword,
            meaning: self.meaning.trim().to_string(),
            meaning_language: self.meaning_language,
            part_of_speech: self.part_of_speech,
            conjugation: self
                .conjugation
                .map(|c| c.trimmed())
                .filter(|c| !c.is_empty()),
            plural_form: self
                .plural_form
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            gender_number_forms: self
                .gender_number_forms
                .map(|g| g.trimmed())
                .filter(|g| !g.is_empty()),
            memory_tip: self.memory_tip.as_deref().and_then(normalize_memory_tip),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordRecord {
    id: Uuid,
    pub headword: String,
    pub meaning: String,
    pub meaning_language: MeaningLanguage,
    pub part_of_speech: PartOfSpeech,
    pub conjugation: Option<Conjugation>,
    pub plural_form: Option<String>,
    pub gender_number_forms: Option<GenderNumberForms>,
    pub memory_tip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub review_stage: u32,
    pub next_review_date: DateTime<Utc>,
    /// `None` until the word has been through its first review.
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

/// The on-disk shape of a word. Every field is optional so that files written by
/// older versions still load; `WordRecord::from_stored` fills in the rest.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredWord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(alias = "word")]
    pub headword: String,
    pub meaning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaning_language: Option<MeaningLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<PartOfSpeech>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verb: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conjugation: Option<Conjugation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural_form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_number_forms: Option<GenderNumberForms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_tip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_stage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl WordRecord {
    /// Create a fresh, never-reviewed word.
    pub fn new(draft: WordDraft, now: DateTime<Utc>) -> Result<Self> {
        let draft = draft.normalized()?;
        let mut word = WordRecord {
            id: Uuid::new_v4(),
            headword: draft.headword,
            meaning: draft.meaning,
            meaning_language: draft.meaning_language,
            part_of_speech: draft.part_of_speech,
            conjugation: draft.conjugation,
            plural_form: draft.plural_form,
            gender_number_forms: draft.gender_number_forms,
            memory_tip: draft.memory_tip,
            created_at: now,
            review_stage: 0,
            next_review_date: now,
            last_reviewed_at: None,
        };
        word.normalize_schedule();
        Ok(word)
    }

    /// Build a word from its stored form. `now` is used only when the stored word has
    /// no creation time.
    ///
    /// Words from older files may lack a part of speech (only `isVerb`) or a last
    /// review time despite having left stage 0. The former is derived from `isVerb`;
    /// the latter is backfilled from the stored due date, or the creation time when
    /// that is missing as well. The due date itself is always recomputed from the
    /// current interval table.
    pub fn from_stored(stored: StoredWord, now: DateTime<Utc>) -> Result<Self> {
        let part_of_speech = match (stored.part_of_speech, stored.is_verb) {
            (Some(pos), _) => pos,
            (None, Some(true)) => PartOfSpeech::Verb,
            (None, _) => PartOfSpeech::Other,
        };

        let draft = WordDraft {
            headword: stored.headword,
            meaning: stored.meaning,
            meaning_language: stored.meaning_language.unwrap_or_default(),
            part_of_speech,
            conjugation: stored.conjugation,
            plural_form: stored.plural_form,
            gender_number_forms: stored.gender_number_forms,
            memory_tip: stored.memory_tip,
        }
        .normalized()?;

        let created_at = stored.created_at.unwrap_or(now);
        let raw_stage = stored.review_stage.unwrap_or(0);
        let review_stage = repetition::clamp_stage(raw_stage);

        let last_reviewed_at = match stored.last_reviewed_at {
            Some(t) => Some(t),
            None if raw_stage > 0 => {
                let from_due = stored
                    .next_review_date
                    .map(|due| due - repetition::interval(review_stage))
                    .filter(|t| *t >= created_at);
                Some(from_due.unwrap_or(created_at))
            }
            None => None,
        };

        let mut word = WordRecord {
            id: stored.id.unwrap_or_else(Uuid::new_v4),
            headword: draft.headword,
            meaning: draft.meaning,
            meaning_language: draft.meaning_language,
            part_of_speech: draft.part_of_speech,
            conjugation: draft.conjugation,
            plural_form: draft.plural_form,
            gender_number_forms: draft.gender_number_forms,
            memory_tip: draft.memory_tip,
            created_at,
            review_stage,
            next_review_date: created_at,
            last_reviewed_at,
        };
        word.normalize_schedule();
        Ok(word)
    }

    pub fn to_stored(&self) -> StoredWord {
        StoredWord {
            id: Some(self.id),
            headword: self.headword.clone(),
            meaning: self.meaning.clone(),
            meaning_language: Some(self.meaning_language),
            part_of_speech: Some(self.part_of_speech),
            is_verb: Some(self.is_verb()),
            conjugation: self.conjugation.clone(),
            plural_form: self.plural_form.clone(),
            gender_number_forms: self.gender_number_forms.clone(),
            memory_tip: self.memory_tip.clone(),
            created_at: Some(self.created_at),
            review_stage: Some(self.review_stage as i64),
            next_review_date: Some(self.next_review_date),
            last_reviewed_at: self.last_reviewed_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_verb(&self) -> bool {
        self.part_of_speech == PartOfSpeech::Verb
    }

    pub fn draft(&self) -> WordDraft {
        WordDraft {
            headword: self.headword.clone(),
            meaning: self.meaning.clone(),
            meaning_language: self.meaning_language,
            part_of_speech: self.part_of_speech,
            conjugation: self.conjugation.clone(),
            plural_form: self.plural_form.clone(),
            gender_number_forms: self.gender_number_forms.clone(),
            memory_tip: self.memory_tip.clone(),
        }
    }

    /// Replace the content fields. Identity and review state are left alone.
    pub fn apply_draft(&mut self, draft: WordDraft) -> Result<()> {
        let draft = draft.normalized()?;
        self.headword = draft.headword;
        self.meaning = draft.meaning;
        self.meaning_language = draft.meaning_language;
        self.part_of_speech = draft.part_of_speech;
        self.conjugation = draft.conjugation;
        self.plural_form = draft.plural_form;
        self.gender_number_forms = draft.gender_number_forms;
        self.memory_tip = draft.memory_tip;
        Ok(())
    }

    pub fn set_memory_tip(&mut self, tip: Option<&str>) {
        self.memory_tip = tip.and_then(normalize_memory_tip);
    }

    /// The time the schedule counts from.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.last_reviewed_at.unwrap_or(self.created_at)
    }

    /// Clamp the stage and recompute the due date from the anchor.
    pub fn normalize_schedule(&mut self) {
        self.review_stage = repetition::clamp_stage(self.review_stage as i64);
        self.next_review_date =
            repetition::next_due_date(self.anchor(), self.review_stage as i64);
    }

    /// Return `true` if the word has been reviewed and its due date has passed.
    pub fn is_due(&self, reference: DateTime<Utc>) -> bool {
        self.last_reviewed_at.is_some() && self.next_review_date <= reference
    }

    pub fn mastery_status(&self) -> MasteryStatus {
        if self.last_reviewed_at.is_none() {
            return MasteryStatus::Unseen;
        }
        match self.review_stage {
            0 => MasteryStatus::Learning,
            1 => MasteryStatus::Fuzzy,
            2 => MasteryStatus::Familiar,
            _ => MasteryStatus::Mastered,
        }
    }

    /// The headword followed by every filled-in form, with duplicates (under
    /// `normalize`) removed.
    pub fn variants(&self) -> Vec<String> {
        let mut candidates: Vec<&str> = vec![&self.headword];
        if let Some(conjugation) = &self.conjugation {
            for (_, form) in conjugation.filled() {
                candidates.push(form);
            }
        }
        if let Some(plural) = &self.plural_form {
            candidates.push(plural);
        }
        if let Some(forms) = &self.gender_number_forms {
            candidates.extend(forms.forms().iter());
        }

        let mut seen = HashSet::new();
        let mut variants = Vec::new();
        for candidate in candidates {
            let trimmed = candidate.trim();
            let key = normalize(trimmed);
            if !key.is_empty() && seen.insert(key) {
                variants.push(trimmed.to_string());
            }
        }
        variants
    }

    fn variant_keys(&self) -> HashSet<String> {
        self.variants().iter().map(|v| normalize(v)).collect()
    }

    pub fn matches_variant(&self, key: &str) -> bool {
        let key = normalize(key);
        !key.is_empty() && self.variant_keys().contains(&key)
    }

    pub fn matches_search(&self, key: &str) -> bool {
        let key = normalize(key);
        if key.is_empty() {
            return true;
        }
        normalize(&self.meaning).contains(&key)
            || self.variants().iter().any(|v| normalize(v).contains(&key))
    }

    /// Return `true` if any variant of `self` is also a variant of `other`.
    pub fn conflicts_with(&self, other: &WordRecord) -> bool {
        let ours = self.variant_keys();
        other.variant_keys().iter().any(|k| ours.contains(k))
    }
}

/// Trim, lowercase, collapse runs of whitespace and compose to NFC, so that
/// precomposed and decomposed accents compare equal.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .nfc()
        .collect::<String>()
}

/// Return the tip with the standard label in front, or `None` if it has no content.
pub fn normalize_memory_tip(tip: &str) -> Option<String> {
    let tip = tip.trim();
    let body = tip.strip_prefix(MEMORY_TIP_PREFIX.trim_end()).unwrap_or(tip).trim();
    if body.is_empty() {
        None
    } else {
        Some(format!("{}{}", MEMORY_TIP_PREFIX, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn hablar() -> WordRecord {
        let mut draft = WordDraft::new("hablar", "to speak");
        draft.part_of_speech = PartOfSpeech::Verb;
        draft.conjugation = Some(Conjugation {
            yo: s("hablo"),
            tu: s(" hablas "),
            el: s("habla"),
            ..Conjugation::default()
        });
        WordRecord::new(draft, now()).unwrap()
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  La   Casa\t"), "la casa");
        assert_eq!(normalize("   "), "");
        // "é" precomposed vs. "e" + combining acute accent.
        assert_eq!(normalize("caf\u{e9}"), normalize("cafe\u{301}"));
    }

    #[test]
    fn new_word_is_unseen_and_scheduled_one_day_out() {
        let word = hablar();
        assert_eq!(word.mastery_status(), MasteryStatus::Unseen);
        assert_eq!(word.review_stage, 0);
        assert_eq!(word.next_review_date, now() + Duration::days(1));
        assert!(!word.is_due(now() + Duration::days(10)));
    }

    #[test]
    fn empty_headword_is_rejected() {
        assert!(WordRecord::new(WordDraft::new("   ", "nothing"), now()).is_err());
    }

    #[test]
    fn variants_include_forms_without_duplicates() {
        let mut word = hablar();
        word.conjugation.as_mut().unwrap().nosotros = s("HABLO");
        let expected = vec![s("hablar"), s("hablo"), s("hablas"), s("habla")];
        assert_eq!(word.variants(), expected);
    }

    #[test]
    fn matches_variant_requires_equality() {
        let word = hablar();
        assert!(word.matches_variant("  Hablas"));
        assert!(!word.matches_variant("habl"));
        assert!(!word.matches_variant("  "));
    }

    #[test]
    fn matches_search_uses_substrings() {
        let word = hablar();
        assert!(word.matches_search(""));
        assert!(word.matches_search("SPEAK"));
        assert!(word.matches_search("habl"));
        assert!(!word.matches_search("comer"));
    }

    #[test]
    fn mastery_status_follows_stage() {
        let mut word = hablar();
        word.last_reviewed_at = Some(now());
        let expected = [
            MasteryStatus::Learning,
            MasteryStatus::Fuzzy,
            MasteryStatus::Familiar,
            MasteryStatus::Mastered,
        ];
        for (stage, status) in expected.iter().enumerate() {
            word.review_stage = stage as u32;
            assert_eq!(word.mastery_status(), *status);
        }
    }

    #[test]
    fn memory_tip_gets_prefix_once() {
        assert_eq!(normalize_memory_tip("  "), None);
        assert_eq!(
            normalize_memory_tip("think of 'hello'"),
            Some(s("Memory tip: think of 'hello'"))
        );
        assert_eq!(
            normalize_memory_tip("Memory tip: think of 'hello'"),
            Some(s("Memory tip: think of 'hello'"))
        );
        assert_eq!(normalize_memory_tip("Memory tip:"), None);
    }

    #[test]
    fn from_stored_derives_part_of_speech_from_is_verb() {
        let stored = StoredWord {
            headword: s("comer"),
            meaning: s("to eat"),
            is_verb: Some(true),
            created_at: Some(now()),
            ..StoredWord::default()
        };
        let word = WordRecord::from_stored(stored, now()).unwrap();
        assert!(word.is_verb());
        assert_eq!(word.part_of_speech, PartOfSpeech::Verb);
    }

    #[test]
    fn from_stored_recomputes_due_date_and_clamps_stage() {
        let reviewed = now() - Duration::days(2);
        let stored = StoredWord {
            headword: s("perro"),
            meaning: s("dog"),
            created_at: Some(now() - Duration::days(40)),
            review_stage: Some(9),
            next_review_date: Some(now() + Duration::days(365)),
            last_reviewed_at: Some(reviewed),
            ..StoredWord::default()
        };
        let word = WordRecord::from_stored(stored, now()).unwrap();
        assert_eq!(word.review_stage, 3);
        assert_eq!(word.next_review_date, reviewed + Duration::days(30));
    }

    #[test]
    fn from_stored_backfills_last_review_for_staged_words() {
        let created = now() - Duration::days(20);
        let due = now() + Duration::days(1);
        let stored = StoredWord {
            headword: s("gato"),
            meaning: s("cat"),
            created_at: Some(created),
            review_stage: Some(2),
            next_review_date: Some(due),
            ..StoredWord::default()
        };
        let word = WordRecord::from_stored(stored, now()).unwrap();
        assert_eq!(word.last_reviewed_at, Some(due - Duration::days(7)));
        assert_eq!(word.next_review_date, due);
        assert_eq!(word.mastery_status(), MasteryStatus::Familiar);
    }

    #[test]
    fn stored_round_trip_preserves_word() {
        let word = hablar();
        let json = serde_json::to_string(&word.to_stored()).unwrap();
        let stored: StoredWord = serde_json::from_str(&json).unwrap();
        assert_eq!(WordRecord::from_stored(stored, now()).unwrap(), word);
    }

    #[test]
    fn plural_form_conflicts_with_headword() {
        let mut draft = WordDraft::new("casa", "house");
        draft.part_of_speech = PartOfSpeech::Noun;
        draft.plural_form = Some(s("casas"));
        let existing = WordRecord::new(draft, now()).unwrap();
        let draft = WordDraft::new(" Casas ", "houses");
        let candidate = WordRecord::new(draft, now()).unwrap();
        assert!(candidate.conflicts_with(&existing));
    }

    fn s(mystr: &str) -> String {
        String::from(mystr)
    }
}
