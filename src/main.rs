/**
 * Drill vocabulary with spaced repetition from the command line.
 */
use chrono::{Local, NaiveTime, TimeZone, Utc};
use clap::Parser;
use colored::*;
use log::debug;

use vocab::common::{
    is_broken_pipe, AddOptions, Command, EditOptions, ImportOptions, LsOptions, Options,
    ReminderOptions, RmOptions, StudyOptions, TipsOptions, WordFields,
};
use vocab::config::{self, Config};
use vocab::iohelper::confirm;
use vocab::persistence::{self, JsonFileStore};
use vocab::services::{AnalysisService, LlmClient};
use vocab::ui::{self, CmdUI};
use vocab::word::{
    Conjugation, GenderNumberForms, MeaningLanguage, PartOfSpeech, WordDraft,
};
use vocab::{my_print, my_println};
use vocab::{Result, StoreEvent, StudySession, VocabError, WordStore};

type Store = WordStore<JsonFileStore>;

fn main() {
    let options = Options::parse();
    if options.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(options) {
        if !is_broken_pipe(&e) {
            eprintln!("{}: {}", "Error".red(), e);
            ::std::process::exit(2);
        }
    }
}

fn run(options: Options) -> Result<()> {
    let dir = config::require_app_dir_path(options.directory.as_deref())?;
    let config = Config::load(&dir)?;
    init_logging(&config);
    debug!("using directory {}", dir.display());

    let mut store = WordStore::open(JsonFileStore::new(config::get_words_path(&dir)))?;
    match options.cmd {
        Command::Study(options) => main_study(&mut store, &config, options),
        Command::Add(options) => main_add(&mut store, &config, options),
        Command::Edit(options) => main_edit(&mut store, &config, options),
        Command::Rm(options) => main_rm(&mut store, options),
        Command::Ls(options) => main_ls(&store, options),
        Command::Due => main_due(&store),
        Command::Stats => ui::stats(&store.stats(Utc::now())),
        Command::Tips(options) => main_tips(&mut store, &config, options),
        Command::Reminder(options) => main_reminder(&mut store, options),
        Command::Export(options) => {
            persistence::export_backup(store.snapshot(), &options.path)
        }
        Command::Import(options) => main_import(&mut store, options),
        Command::Advance(options) => {
            let id = store.find_by_prefix(&options.id)?.id();
            let event = store.advance(id, Utc::now())?;
            report_review(&store, &event)
        }
        Command::Reset(options) => {
            let id = store.find_by_prefix(&options.id)?.id();
            let event = store.reset(id, Utc::now())?;
            report_review(&store, &event)
        }
    }
}

/// `RUST_LOG` wins over the configured level, which wins over "warn".
fn init_logging(config: &Config) {
    let default_filter = config
        .log_level
        .clone()
        .unwrap_or_else(|| String::from("warn"));
    let env = env_logger::Env::default().default_filter_or(default_filter);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

/// The main function for the `study` subcommand.
fn main_study(store: &mut Store, config: &Config, options: StudyOptions) -> Result<()> {
    let mut ui = CmdUI::new(config.languages.clone());
    let count = options.num_to_study.unwrap_or(config.session_size);
    let words = store.session_words(count, Utc::now());
    if words.is_empty() {
        return ui.nothing_to_study();
    }

    let pool = store.words().to_vec();
    let mut session = StudySession::new(words);
    let mut rng = rand::thread_rng();
    let mut completed = 0;
    let mut perfect = 0;

    loop {
        let question = match session.next_question(&pool, &mut rng) {
            Some(question) => question.clone(),
            None => break,
        };
        ui.question(&question)?;

        // Ctrl+D and Ctrl+C both end the session early. Words already finished have
        // been saved; the rest are left as they were.
        let response = match ui.prompt() {
            Ok(Some(response)) => response,
            Ok(None) | Err(VocabError::ReadlineInterrupted) => break,
            Err(e) => return Err(e),
        };
        let response = ui::resolve_choice(&question, &response);

        if let Some(feedback) = session.submit(&response) {
            if feedback.correct {
                ui.correct()?;
            } else {
                let tip = session.current_word().and_then(|w| w.memory_tip.clone());
                ui.incorrect(&feedback.answer, tip.as_deref())?;
            }
        }

        if let Some(done) = session.advance() {
            let event =
                store.record_session_result(done.word_id, done.errors, Utc::now())?;
            if let StoreEvent::Reviewed { outcome, .. } = &event {
                if let Some(word) = store.get(done.word_id) {
                    ui.word_completed(word, done.errors, outcome)?;
                }
            }
            completed += 1;
            if done.errors == 0 {
                perfect += 1;
            }
        }
    }

    ui.results(completed, perfect)
}

/// The main function for the `add` subcommand.
fn main_add(store: &mut Store, config: &Config, options: AddOptions) -> Result<()> {
    let mut draft = if options.analyze {
        let target =
            parse_language(options.fields.language.as_deref())?.unwrap_or_default();
        let client = LlmClient::new(config.llm.clone(), config.languages.clone())?;
        client.analyze(&options.headword, target)?.into_draft(&options.headword, None)
    } else {
        if options.fields.meaning.is_none() {
            return Err(VocabError::InvalidInput(String::from(
                "a meaning is required unless --analyze is given",
            )));
        }
        WordDraft::new(&options.headword, "")
    };
    apply_fields(&mut draft, options.fields)?;

    if let StoreEvent::Added(id) = store.add(draft, Utc::now())? {
        if let Some(word) = store.get(id) {
            ui::word_details(word)?;
        }
    }
    Ok(())
}

/// The main function for the `edit` subcommand.
fn main_edit(store: &mut Store, config: &Config, options: EditOptions) -> Result<()> {
    let id = store.find_by_prefix(&options.id)?.id();

    if options.analyze {
        let (headword, language) = match store.get(id) {
            Some(word) => (word.headword.clone(), word.meaning_language),
            None => return Err(VocabError::WordNotFound(id)),
        };
        let client = LlmClient::new(config.llm.clone(), config.languages.clone())?;
        let analysis = client.analyze(&headword, language)?;
        store.apply_analysis(id, analysis)?;
    }

    let current = store.get(id).map(|w| w.draft()).ok_or(VocabError::WordNotFound(id))?;
    let mut draft = current.clone();
    if let Some(headword) = options.headword {
        draft.headword = headword;
    }
    apply_fields(&mut draft, options.fields)?;
    if draft != current {
        store.update(id, draft)?;
    }

    match store.get(id) {
        Some(word) => ui::word_details(word),
        None => Err(VocabError::WordNotFound(id)),
    }
}

/// The main function for the `rm` subcommand.
fn main_rm(store: &mut Store, options: RmOptions) -> Result<()> {
    let word = store.find_by_prefix(&options.id)?;
    let id = word.id();
    let message = format!("Are you sure you want to remove '{}'? ", word.headword);
    if options.force || confirm(&message)? {
        store.remove(id)?;
    }
    Ok(())
}

/// The main function for the `ls` subcommand.
fn main_ls(store: &Store, options: LsOptions) -> Result<()> {
    let words = match &options.term {
        Some(term) => store.search(term),
        None => store.words().iter().collect(),
    };
    if words.is_empty() {
        return my_println!("No words found.");
    }
    for word in words {
        ui::word_line(word)?;
    }
    Ok(())
}

/// The main function for the `due` subcommand.
fn main_due(store: &Store) -> Result<()> {
    let due = store.due(Utc::now());
    if due.is_empty() {
        return my_println!("No words are due for review.");
    }
    for word in due {
        ui::word_line(word)?;
    }
    Ok(())
}

/// The main function for the `tips` subcommand.
fn main_tips(store: &mut Store, config: &Config, options: TipsOptions) -> Result<()> {
    let ids = if options.ids.is_empty() {
        store
            .words()
            .iter()
            .filter(|w| w.memory_tip.is_none())
            .map(|w| w.id())
            .collect()
    } else {
        let mut ids = Vec::with_capacity(options.ids.len());
        for prefix in options.ids.iter() {
            ids.push(store.find_by_prefix(prefix)?.id());
        }
        ids
    };
    if ids.is_empty() {
        return my_println!("Every word already has a memory tip.");
    }

    let client = LlmClient::new(config.llm.clone(), config.languages.clone())?;
    let events = store.refresh_tips(&ids, &client)?;
    my_println!("Generated {} memory tips.", events.len())
}

/// The main function for the `reminder` subcommand.
fn main_reminder(store: &mut Store, options: ReminderOptions) -> Result<()> {
    if options.time.is_some() || options.on || options.off {
        let time = match &options.time {
            Some(time) => parse_reminder_time(time)?,
            None => store.reminder_time(),
        };
        let enabled = if options.on {
            true
        } else if options.off {
            false
        } else {
            store.reminders_enabled()
        };
        store.set_reminder(time, enabled)?;
    }

    let time = store.reminder_time().with_timezone(&Local).format("%H:%M");
    if store.reminders_enabled() {
        my_println!("Daily reminder at {} ({}).", time, "on".green())
    } else {
        my_println!("Daily reminder at {} ({}).", time, "off".red())
    }
}

/// The main function for the `import` subcommand.
fn main_import(store: &mut Store, options: ImportOptions) -> Result<()> {
    let backup = persistence::import_backup(&options.path)?;
    let message = format!(
        "Replace {} words with the {} words in the backup? ",
        store.words().len(),
        backup.words.len()
    );
    if options.force || confirm(&message)? {
        store.import(backup)?;
    }
    Ok(())
}

fn report_review(store: &Store, event: &StoreEvent) -> Result<()> {
    if let StoreEvent::Reviewed { word_id, outcome } = event {
        if let Some(word) = store.get(*word_id) {
            my_print!(
                "{}: stage {} -> {}, ",
                word.headword.cyan(),
                outcome.previous_stage,
                outcome.stage
            )?;
            my_println!("next review {}", ui::format_date(outcome.next_review_date))?;
        }
    }
    Ok(())
}

/// Overlay the fields given on the command line onto `draft`.
fn apply_fields(draft: &mut WordDraft, fields: WordFields) -> Result<()> {
    if let Some(meaning) = fields.meaning {
        draft.meaning = meaning;
    }
    if let Some(language) = parse_language(fields.language.as_deref())? {
        draft.meaning_language = language;
    }
    if let Some(pos) = fields.part_of_speech {
        draft.part_of_speech = PartOfSpeech::from_str(&pos).ok_or_else(|| {
            VocabError::InvalidInput(format!("unknown part of speech '{}'", pos))
        })?;
    }
    if let Some(plural) = fields.plural {
        draft.plural_form = Some(plural);
    }
    if let Some(conjugation) = fields.conjugation {
        draft.conjugation = Some(parse_conjugation(&conjugation)?);
    }
    if let Some(forms) = fields.gender_number_forms {
        draft.gender_number_forms = Some(parse_gender_number_forms(&forms)?);
    }
    if let Some(tip) = fields.tip {
        draft.memory_tip = Some(tip);
    }
    Ok(())
}

fn parse_language(language: Option<&str>) -> Result<Option<MeaningLanguage>> {
    match language {
        Some(language) => MeaningLanguage::from_str(language)
            .map(Some)
            .ok_or_else(|| {
                VocabError::InvalidInput(format!(
                    "unknown meaning language '{}'",
                    language
                ))
            }),
        None => Ok(None),
    }
}

fn split_forms(forms: &str, expected: usize, what: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = forms.split(',').map(|f| f.trim().to_string()).collect();
    if parts.len() != expected {
        return Err(VocabError::InvalidInput(format!(
            "expected {} comma-separated {}, got {}",
            expected,
            what,
            parts.len()
        )));
    }
    Ok(parts)
}

fn parse_conjugation(forms: &str) -> Result<Conjugation> {
    let mut parts = split_forms(forms, 6, "conjugated forms")?.into_iter();
    let mut next = || parts.next().unwrap_or_default();
    Ok(Conjugation {
        yo: next(),
        tu: next(),
        el: next(),
        nosotros: next(),
        vosotros: next(),
        ellos: next(),
    })
}

fn parse_gender_number_forms(forms: &str) -> Result<GenderNumberForms> {
    let mut parts = split_forms(forms, 4, "adjective forms")?.into_iter();
    let mut next = || parts.next().unwrap_or_default();
    Ok(GenderNumberForms {
        masculine_singular: next(),
        feminine_singular: next(),
        masculine_plural: next(),
        feminine_plural: next(),
    })
}

/// Parse "HH:MM" as a local time today.
fn parse_reminder_time(time: &str) -> Result<chrono::DateTime<Utc>> {
    let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| {
            VocabError::InvalidInput(format!(
                "'{}' is not a time of the form HH:MM",
                time
            ))
        })?;
    let naive = Local::now().date_naive().and_time(parsed);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| {
            VocabError::InvalidInput(format!("'{}' does not exist today", time))
        })
}
