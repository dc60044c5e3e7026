/**
 * Schedule words for review based on how the last study session went.
 *
 * Stage 0: review the next day
 * Stage 1: review in three days
 * Stage 2: review in a week
 * Stage 3: review once a month or so
 *
 * A session with no mistakes moves a word up one stage, a session with three or more
 * mistakes moves it down one stage, and anything in between keeps it where it is. In
 * every case the clock restarts from the time of the session.
 */
use chrono::{DateTime, Duration, Utc};

use super::word::WordRecord;

/// Days until the next review, indexed by stage.
const INTERVAL_DAYS: [i64; 4] = [1, 3, 7, 30];
/// How many mistakes in one session send a word down a stage.
pub const DEMOTION_THRESHOLD: u32 = 3;

pub const MAX_STAGE: u32 = (INTERVAL_DAYS.len() - 1) as u32;

/// The review-interval table, as durations.
pub fn intervals() -> Vec<Duration> {
    INTERVAL_DAYS.iter().map(|d| Duration::days(*d)).collect()
}

pub fn clamp_stage(stage: i64) -> u32 {
    stage.max(0).min(MAX_STAGE as i64) as u32
}

pub fn interval(stage: u32) -> Duration {
    Duration::days(INTERVAL_DAYS[clamp_stage(stage as i64) as usize])
}

pub fn next_due_date(anchor: DateTime<Utc>, stage: i64) -> DateTime<Utc> {
    anchor + interval(clamp_stage(stage))
}

/// How a review changed a word's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub previous_stage: u32,
    pub stage: u32,
    pub next_review_date: DateTime<Utc>,
}

impl ReviewOutcome {
    pub fn promoted(&self) -> bool {
        self.stage > self.previous_stage
    }

    pub fn demoted(&self) -> bool {
        self.stage < self.previous_stage
    }
}

/// Record a completed study session with `errors` mistakes. This is the only
/// place a word's stage changes because of how well it was answered.
pub fn apply_session_result(
    word: &mut WordRecord,
    errors: u32,
    now: DateTime<Utc>,
) -> ReviewOutcome {
    let previous_stage = clamp_stage(word.review_stage as i64);
    let stage = if errors == 0 {
        (previous_stage + 1).min(MAX_STAGE)
    } else if errors >= DEMOTION_THRESHOLD {
        previous_stage.saturating_sub(1)
    } else {
        previous_stage
    };
    set_schedule(word, stage, now);
    ReviewOutcome { previous_stage, stage, next_review_date: word.next_review_date }
}

/// Move a word up one stage without a study session.
pub fn advance(word: &mut WordRecord, now: DateTime<Utc>) -> ReviewOutcome {
    let previous_stage = clamp_stage(word.review_stage as i64);
    set_schedule(word, (previous_stage + 1).min(MAX_STAGE), now);
    ReviewOutcome {
        previous_stage,
        stage: word.review_stage,
        next_review_date: word.next_review_date,
    }
}

/// Move a word back to stage 0 without a study session.
pub fn reset(word: &mut WordRecord, now: DateTime<Utc>) -> ReviewOutcome {
    let previous_stage = clamp_stage(word.review_stage as i64);
    set_schedule(word, 0, now);
    ReviewOutcome { previous_stage, stage: 0, next_review_date: word.next_review_date }
}

fn set_schedule(word: &mut WordRecord, stage: u32, now: DateTime<Utc>) {
    word.review_stage = stage;
    word.last_reviewed_at = Some(now);
    word.next_review_date = next_due_date(now, stage as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{MasteryStatus, WordDraft};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap()
    }

    fn word_at_stage(stage: u32) -> WordRecord {
        let created = now() - Duration::days(60);
        let draft = WordDraft::new("libro", "book");
        let mut word = WordRecord::new(draft, created).unwrap();
        word.review_stage = stage;
        word.last_reviewed_at = Some(now() - Duration::days(40));
        word.normalize_schedule();
        word
    }

    #[test]
    fn next_due_date_clamps_stage() {
        assert_eq!(next_due_date(now(), -4), now() + Duration::days(1));
        assert_eq!(next_due_date(now(), 2), now() + Duration::days(7));
        assert_eq!(next_due_date(now(), 100), now() + Duration::days(30));
        for stage in -2..6 {
            let once = clamp_stage(stage);
            assert_eq!(clamp_stage(once as i64), once);
            assert_eq!(next_due_date(now(), stage), now() + intervals()[once as usize]);
        }
    }

    #[test]
    fn perfect_session_promotes_new_word() {
        let mut word = WordRecord::new(WordDraft::new("libro", "book"), now()).unwrap();
        assert_eq!(word.mastery_status(), MasteryStatus::Unseen);

        let outcome = apply_session_result(&mut word, 0, now());
        assert!(outcome.promoted());
        assert_eq!(word.review_stage, 1);
        assert_eq!(word.mastery_status(), MasteryStatus::Fuzzy);
        assert_eq!(word.next_review_date, now() + Duration::days(3));
        assert_eq!(word.last_reviewed_at, Some(now()));
    }

    #[test]
    fn three_errors_demote_familiar_word() {
        let mut word = word_at_stage(2);
        assert_eq!(word.mastery_status(), MasteryStatus::Familiar);

        let outcome = apply_session_result(&mut word, 3, now());
        assert!(outcome.demoted());
        assert_eq!(word.review_stage, 1);
        assert_eq!(word.next_review_date, now() + Duration::days(3));
    }

    #[test]
    fn one_or_two_errors_keep_stage_but_restart_clock() {
        for errors in 1..3 {
            let mut word = word_at_stage(2);
            let outcome = apply_session_result(&mut word, errors, now());
            assert_eq!(outcome.stage, 2);
            assert_eq!(word.last_reviewed_at, Some(now()));
            assert_eq!(word.next_review_date, now() + Duration::days(7));
        }
    }

    #[test]
    fn stage_stays_within_table() {
        let mut top = word_at_stage(MAX_STAGE);
        apply_session_result(&mut top, 0, now());
        assert_eq!(top.review_stage, MAX_STAGE);

        let mut bottom = word_at_stage(0);
        apply_session_result(&mut bottom, 7, now());
        assert_eq!(bottom.review_stage, 0);
        assert_eq!(bottom.mastery_status(), MasteryStatus::Learning);
    }

    #[test]
    fn advance_and_reset_anchor_at_now() {
        let mut word = word_at_stage(1);
        advance(&mut word, now());
        assert_eq!(word.review_stage, 2);
        assert_eq!(word.next_review_date, now() + Duration::days(7));

        reset(&mut word, now());
        assert_eq!(word.review_stage, 0);
        assert_eq!(word.next_review_date, now() + Duration::days(1));
        assert_eq!(word.last_reviewed_at, Some(now()));
    }
}
