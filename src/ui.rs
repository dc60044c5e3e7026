/**
 * The command-line user interface for study sessions and word listings.
 */
use chrono::{DateTime, Local, Utc};
use colored::*;

use super::common::Result;
use super::config::LanguageConfig;
use super::iohelper::{prettyprint, prettyprint_colored, prompt};
use super::quiz::{Question, RoundKind};
use super::repetition::ReviewOutcome;
use super::store::Stats;
use super::word::{MasteryStatus, WordRecord};

const CHOICE_LETTERS: &str = "abcd";
/// How many characters of a word's id are shown in listings.
const SHORT_ID_LEN: usize = 8;

pub struct CmdUI {
    number: usize,
    languages: LanguageConfig,
}

impl CmdUI {
    pub fn new(languages: LanguageConfig) -> Self {
        Self { number: 0, languages }
    }

    pub fn question(&mut self, question: &Question) -> Result<()> {
        self.number += 1;
        my_print!("\n")?;
        let prefix = format!("  ({}) ", self.number);
        prettyprint_colored(&question.prompt, &prefix, None, Some(Color::Cyan))?;

        let instruction = match question.kind {
            RoundKind::MeaningRecognition => String::from("Choose the meaning."),
            RoundKind::ProductionRecognition => {
                format!("Choose the {} word.", self.languages.learning)
            }
            RoundKind::Dictation => match question.subject {
                Some(subject) => format!(
                    "Type the {} form for '{}'.",
                    self.languages.learning,
                    subject.label()
                ),
                None => format!("Type the {} word.", self.languages.learning),
            },
        };
        prettyprint_colored(&instruction, "      ", Some(Color::BrightBlue), None)?;

        if question.kind.is_multiple_choice() {
            my_print!("\n")?;
            let lettered = CHOICE_LETTERS.chars().zip(question.choices.iter());
            for (letter, choice) in lettered {
                let prefix = format!("     ({}) ", letter);
                prettyprint(choice, &prefix)?;
            }
        }
        my_print!("\n")
    }

    pub fn prompt(&mut self) -> Result<Option<String>> {
        prompt("> ")
    }

    pub fn correct(&mut self) -> Result<()> {
        prettyprint(&format!("{}", "Correct!".green()), "")
    }

    pub fn incorrect(&mut self, answer: &str, memory_tip: Option<&str>) -> Result<()> {
        let message = format!(
            "{} The correct answer was {}.",
            "Incorrect.".red(),
            answer.green()
        );
        prettyprint(&message, "")?;
        if let Some(tip) = memory_tip {
            prettyprint_colored(tip, "  ", Some(Color::Yellow), None)?;
        }
        Ok(())
    }

    pub fn word_completed(
        &mut self,
        word: &WordRecord,
        errors: u32,
        outcome: &ReviewOutcome,
    ) -> Result<()> {
        let change = if outcome.promoted() {
            "moved up".green()
        } else if outcome.demoted() {
            "moved down".red()
        } else {
            "stays".normal()
        };
        let mistakes = match errors {
            0 => String::from("no mistakes"),
            1 => String::from("1 mistake"),
            n => format!("{} mistakes", n),
        };
        let message = format!(
            "Finished {} with {}: {} to stage {}, next review {}.",
            word.headword.cyan(),
            mistakes,
            change,
            outcome.stage,
            format_date(outcome.next_review_date),
        );
        my_print!("\n")?;
        prettyprint(&message, "")
    }

    pub fn results(&mut self, words: usize, perfect: usize) -> Result<()> {
        if words == 0 {
            return Ok(());
        }
        my_print!("\n\n")?;
        my_print!("Studied ")?;
        my_print!("{}", format!("{}", words).cyan())?;
        if words == 1 {
            my_println!(" word")?;
        } else {
            my_println!(" words")?;
        }
        my_print!("  {}", format!("{}", perfect).green())?;
        my_print!(" without mistakes\n")?;
        my_print!("  {}", format!("{}", words - perfect).red())?;
        my_print!(" with mistakes\n")
    }

    pub fn nothing_to_study(&mut self) -> Result<()> {
        my_println!("Nothing to study. Add some words with `vocab add`.")
    }
}

/// If the user typed the letter of a choice, return that choice; otherwise return the
/// response as it is, to be compared against the answer.
pub fn resolve_choice(question: &Question, response: &str) -> String {
    if question.kind.is_multiple_choice() {
        let lowered = response.trim().to_lowercase();
        let mut chars = lowered.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            if let Some(index) = CHOICE_LETTERS.find(letter) {
                if let Some(choice) = question.choices.get(index) {
                    return choice.clone();
                }
            }
        }
    }
    response.to_string()
}

pub fn short_id(word: &WordRecord) -> String {
    word.id().to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn status_colored(status: MasteryStatus) -> ColoredString {
    let label = format!("{:<8}", status.label());
    match status {
        MasteryStatus::Unseen => label.normal(),
        MasteryStatus::Learning => label.red(),
        MasteryStatus::Fuzzy => label.yellow(),
        MasteryStatus::Familiar => label.bright_green(),
        MasteryStatus::Mastered => label.green(),
    }
}

pub fn word_line(word: &WordRecord) -> Result<()> {
    let status = status_colored(word.mastery_status());
    let prefix = format!("{}  {}  ", short_id(word), status);
    let message = format!("{}  {}", word.headword.cyan(), word.meaning);
    prettyprint(&message, &prefix)
}

pub fn word_details(word: &WordRecord) -> Result<()> {
    my_println!("{}  {}", word.headword.cyan(), word.id())?;
    my_println!("  meaning:  {}", word.meaning)?;
    my_println!("  type:     {}", word.part_of_speech.as_str())?;
    let variants = word.variants();
    if variants.len() > 1 {
        my_println!("  forms:    {}", variants[1..].join(", "))?;
    }
    if let Some(tip) = &word.memory_tip {
        my_println!("  {}", tip)?;
    }
    my_println!(
        "  status:   {} (stage {})",
        word.mastery_status().label(),
        word.review_stage
    )?;
    if word.last_reviewed_at.is_some() {
        my_println!("  due:      {}", format_date(word.next_review_date))?;
    }
    Ok(())
}

pub fn stats(stats: &Stats) -> Result<()> {
    my_println!(
        "{} words, {} due for review",
        format!("{}", stats.total).cyan(),
        format!("{}", stats.due).cyan()
    )?;
    for (status, count) in stats.by_status.iter() {
        my_println!("  {}  {}", status_colored(*status), count)?;
    }
    Ok(())
}
