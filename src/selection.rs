/**
 * Choose which words to study: words whose review is due come first, most overdue
 * first, and any remaining room in the session goes to words that have never been
 * studied, oldest first.
 */
use chrono::{DateTime, Utc};

use super::word::WordRecord;

/// Return the reviewed words due at `reference`, earliest due date first. Words
/// due at the same time keep their relative order.
pub fn due_words<'a>(
    words: &'a [WordRecord],
    reference: DateTime<Utc>,
) -> Vec<&'a WordRecord> {
    let mut due: Vec<&WordRecord> =
        words.iter().filter(|w| w.is_due(reference)).collect();
    // `sort_by_key` is stable.
    due.sort_by_key(|w| w.next_review_date);
    due
}

/// Return the words that have never been reviewed, oldest first.
pub fn unseen_words(words: &[WordRecord]) -> Vec<&WordRecord> {
    let mut unseen: Vec<&WordRecord> = words
        .iter()
        .filter(|w| w.last_reviewed_at.is_none())
        .collect();
    unseen.sort_by_key(|w| w.created_at);
    unseen
}

/// Choose at most `count` words for a session. A `count` of zero is treated as one.
pub fn session_words<'a>(
    words: &'a [WordRecord],
    count: usize,
    reference: DateTime<Utc>,
) -> Vec<&'a WordRecord> {
    let count = count.max(1);
    let mut chosen = due_words(words, reference);
    if chosen.len() >= count {
        chosen.truncate(count);
        return chosen;
    }

    let remaining = count - chosen.len();
    chosen.extend(unseen_words(words).into_iter().take(remaining));
    chosen
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::repetition;
    use crate::word::WordDraft;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn unseen(headword: &str, created_days_ago: i64) -> WordRecord {
        let created = now() - Duration::days(created_days_ago);
        WordRecord::new(WordDraft::new(headword, "meaning"), created).unwrap()
    }

    /// A reviewed word at stage 0 whose next review is `due_in` from now.
    fn reviewed(headword: &str, due_in: Duration) -> WordRecord {
        let mut word = unseen(headword, 30);
        repetition::reset(&mut word, now() + due_in - repetition::interval(0));
        word
    }

    fn headwords(words: &[&WordRecord]) -> Vec<String> {
        words.iter().map(|w| w.headword.clone()).collect()
    }

    #[test]
    fn due_words_are_sorted_earliest_first() {
        let words = vec![
            reviewed("later", -Duration::hours(1)),
            reviewed("earlier", -Duration::hours(2)),
            reviewed("future", Duration::hours(5)),
            unseen("fresh", 10),
        ];
        let due = due_words(&words, now());
        assert_eq!(headwords(&due), vec!["earlier", "later"]);
        for word in due.iter() {
            assert!(word.last_reviewed_at.is_some());
            assert!(word.next_review_date <= now());
        }
    }

    #[test]
    fn earlier_due_word_comes_first() {
        let t = now() - Duration::hours(3);
        let words = vec![
            reviewed("second", t + Duration::hours(1) - now()),
            reviewed("first", t - now()),
        ];
        assert_eq!(headwords(&due_words(&words, now())), vec!["first", "second"]);
    }

    #[test]
    fn equal_due_dates_keep_original_order() {
        let words = vec![
            reviewed("b", -Duration::hours(1)),
            reviewed("a", -Duration::hours(1)),
            reviewed("c", -Duration::hours(1)),
        ];
        assert_eq!(headwords(&due_words(&words, now())), vec!["b", "a", "c"]);
    }

    #[test]
    fn unseen_words_are_never_due() {
        let words = vec![unseen("old", 400)];
        assert!(due_words(&words, now()).is_empty());
    }

    #[test]
    fn session_prefers_due_words() {
        let words = vec![
            unseen("new1", 5),
            reviewed("due1", -Duration::hours(4)),
            reviewed("due2", -Duration::hours(3)),
            reviewed("due3", -Duration::hours(2)),
        ];
        assert_eq!(headwords(&session_words(&words, 2, now())), vec!["due1", "due2"]);
    }

    #[test]
    fn session_fills_with_oldest_unseen_words() {
        let words = vec![
            unseen("newer", 1),
            reviewed("due", -Duration::hours(1)),
            unseen("oldest", 9),
            unseen("older", 4),
            reviewed("not due", Duration::days(2)),
        ];
        let chosen = session_words(&words, 3, now());
        assert_eq!(headwords(&chosen), vec!["due", "oldest", "older"]);
    }

    #[test]
    fn session_never_pads_or_duplicates() {
        let words = vec![unseen("one", 1), reviewed("two", -Duration::hours(1))];
        let chosen = session_words(&words, 10, now());
        assert_eq!(chosen.len(), 2);
        let ids: HashSet<_> = chosen.iter().map(|w| w.id()).collect();
        assert_eq!(ids.len(), chosen.len());
    }

    #[test]
    fn zero_count_still_picks_one_word() {
        let words = vec![unseen("one", 1), unseen("two", 2)];
        assert_eq!(headwords(&session_words(&words, 0, now())), vec!["two"]);
        assert!(session_words(&[], 0, now()).is_empty());
    }
}
