/**
 * The language-model services: analysing a new word, and writing memory tips.
 *
 * The rest of the crate only sees the `AnalysisService` and `TipService` traits and
 * their typed results. `LlmClient` implements both over an OpenAI-compatible or
 * Anthropic chat endpoint, asking for a strict JSON reply.
 */
use std::time::Duration;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::ServiceError;
use super::config::{LanguageConfig, LlmConfig};
use super::word::{
    Conjugation, GenderNumberForms, MeaningLanguage, PartOfSpeech, WordDraft,
    WordRecord,
};

/// How much of an error body to keep in a `TransportFailure`.
const MAX_ERROR_BODY: usize = 300;

/// What the language model says about a word.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// The dictionary form, if the word given was inflected.
    pub lemma: Option<String>,
    pub part_of_speech: Option<PartOfSpeech>,
    pub is_verb: Option<bool>,
    pub meaning: String,
    pub language: MeaningLanguage,
    pub conjugation: Option<Conjugation>,
    pub plural_form: Option<String>,
    pub gender_number_forms: Option<GenderNumberForms>,
}

impl AnalysisResult {
    /// Turn the analysis into word content. `headword` is used when there is no lemma;
    /// `memory_tip` is carried over unchanged.
    pub fn into_draft(self, headword: &str, memory_tip: Option<String>) -> WordDraft {
        let part_of_speech = match (self.part_of_speech, self.is_verb) {
            (Some(pos), _) => pos,
            (None, Some(true)) => PartOfSpeech::Verb,
            (None, _) => PartOfSpeech::Other,
        };
        let headword = self
            .lemma
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| headword.to_string());

        WordDraft {
            headword,
            meaning: self.meaning,
            meaning_language: self.language,
            part_of_speech,
            conjugation: self.conjugation,
            plural_form: self.plural_form,
            gender_number_forms: self.gender_number_forms,
            memory_tip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tips {
    pub tips: String,
}

pub trait AnalysisService {
    fn analyze(
        &self,
        headword: &str,
        target: MeaningLanguage,
    ) -> Result<AnalysisResult, ServiceError>;
}

pub trait TipService {
    fn generate_tips(&self, word: &WordRecord) -> Result<Tips, ServiceError>;
}

/// The JSON the model is asked to reply with for an analysis.
#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct AnalysisReply {
    lemma: Option<String>,
    part_of_speech: Option<String>,
    is_verb: Option<bool>,
    meaning: String,
    language: Option<String>,
    conjugation: Option<Conjugation>,
    plural_form: Option<String>,
    gender_number_forms: Option<GenderNumberForms>,
}

#[derive(Deserialize, Debug)]
struct TipsReply {
    tips: String,
}

pub struct LlmClient {
    config: LlmConfig,
    languages: LanguageConfig,
    http: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(
        config: LlmConfig,
        languages: LanguageConfig,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(transport_failure)?;
        Ok(LlmClient { config, languages, http })
    }

    /// Send `prompt` and return the text of the reply.
    fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let api_key = self.config.api_key().ok_or(ServiceError::MissingCredential)?;
        let url = endpoint_url(&self.config);
        let body = request_body(&self.config, prompt);
        debug!("POST {} (model {})", url, self.config.model);

        let mut request = self.http.post(&url).json(&body);
        if self.config.provider == "anthropic" {
            request = request
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01");
        } else {
            request = request.bearer_auth(api_key);
            if self.config.provider == "openrouter" {
                request = request.header("x-title", "vocab");
            }
        }

        let response = request.send().map_err(transport_failure)?;
        let status = response.status();
        let text = response.text().map_err(transport_failure)?;
        if !status.is_success() {
            return Err(ServiceError::TransportFailure {
                code: Some(status.as_u16()),
                message: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| {
                ServiceError::InvalidResponse(format!("body is not JSON: {}", e))
            })?;
        extract_reply_text(&self.config.provider, &value)
    }
}

impl AnalysisService for LlmClient {
    fn analyze(
        &self,
        headword: &str,
        target: MeaningLanguage,
    ) -> Result<AnalysisResult, ServiceError> {
        let prompt = analysis_prompt(headword, &self.languages, target);
        let reply = self.complete(&prompt)?;
        let result = parse_analysis(&reply, target)?;
        info!("analysed '{}'", headword);
        Ok(result)
    }
}

impl TipService for LlmClient {
    fn generate_tips(&self, word: &WordRecord) -> Result<Tips, ServiceError> {
        let prompt = tips_prompt(word, &self.languages);
        let reply = self.complete(&prompt)?;
        let tips = parse_tips(&reply)?;
        info!("generated tips for '{}'", word.headword);
        Ok(tips)
    }
}

fn transport_failure(e: reqwest::Error) -> ServiceError {
    ServiceError::TransportFailure {
        code: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

fn endpoint_url(config: &LlmConfig) -> String {
    let base = config.base_url.trim_end_matches('/');
    match (config.provider.as_str(), base.is_empty()) {
        ("anthropic", true) => String::from("https://api.anthropic.com/v1/messages"),
        ("anthropic", false) => format!("{}/v1/messages", base),
        ("openrouter", true) => {
            String::from("https://openrouter.ai/api/v1/chat/completions")
        }
        (_, true) => String::from("https://api.openai.com/v1/chat/completions"),
        (_, false) => format!("{}/v1/chat/completions", base),
    }
}

fn request_body(config: &LlmConfig, prompt: &str) -> Value {
    if config.provider == "anthropic" {
        json!({
            "model": config.model,
            "max_tokens": 1024,
            "messages": [{ "role": "user", "content": prompt }]
        })
    } else {
        json!({
            "model": config.model,
            "max_tokens": 1024,
            "response_format": { "type": "json_object" },
            "messages": [{ "role": "user", "content": prompt }]
        })
    }
}

/// Pull the reply text out of a chat-completion response.
fn extract_reply_text(provider: &str, value: &Value) -> Result<String, ServiceError> {
    let text = if provider == "anthropic" {
        value["content"][0]["text"].as_str()
    } else {
        value["choices"][0]["message"]["content"].as_str()
    };
    match text.map(|t| t.trim()) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(ServiceError::InvalidResponse(String::from(
            "reply has no text content",
        ))),
    }
}

fn analysis_prompt(
    headword: &str,
    languages: &LanguageConfig,
    target: MeaningLanguage,
) -> String {
    format!(
        "You are a {learning} dictionary. Analyse the {learning} word \
         \"{headword}\" and reply with a single JSON object and nothing else, \
         with these keys:\n\
         - \"lemma\": the dictionary form of the word\n\
         - \"partOfSpeech\": one of \"verb\", \"noun\", \"adjective\", \"other\"\n\
         - \"isVerb\": true or false\n\
         - \"meaning\": a short meaning written in {target_name}\n\
         - \"language\": \"{target_key}\"\n\
         - \"conjugation\": for verbs only, the present tense as an object with keys \
         \"yo\", \"tu\", \"el\", \"nosotros\", \"vosotros\", \"ellos\"\n\
         - \"pluralForm\": for nouns only, the plural\n\
         - \"genderNumberForms\": for adjectives only, an object with keys \
         \"masculineSingular\", \"feminineSingular\", \
         \"masculinePlural\", \"femininePlural\"\n\
         Omit keys that do not apply.",
        learning = languages.learning,
        headword = headword,
        target_name = languages.name(target),
        target_key = match target {
            MeaningLanguage::Primary => "primary",
            MeaningLanguage::Secondary => "secondary",
        },
    )
}

fn tips_prompt(word: &WordRecord, languages: &LanguageConfig) -> String {
    format!(
        "Write one short, memorable tip in {meaning_language} to help a learner \
         remember the {learning} word \"{headword}\" ({pos}), which means \
         \"{meaning}\". Reply with a single JSON object and nothing else: \
         {{\"tips\": \"...\"}}",
        meaning_language = languages.name(word.meaning_language),
        learning = languages.learning,
        headword = word.headword,
        pos = word.part_of_speech.as_str(),
        meaning = word.meaning,
    )
}

/// Models sometimes wrap JSON in a Markdown code fence despite being told not to.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_open = match trimmed.find('\n') {
        Some(newline) => &trimmed[newline + 1..],
        None => return trimmed.trim_matches('`').trim(),
    };
    without_open.trim_end().trim_end_matches("```").trim()
}

fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, ServiceError> {
    serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| ServiceError::ParseFailure(e.to_string()))
}

fn parse_analysis(
    reply: &str,
    target: MeaningLanguage,
) -> Result<AnalysisResult, ServiceError> {
    let reply: AnalysisReply = parse_json_reply(reply)?;
    let meaning = reply.meaning.trim().to_string();
    if meaning.is_empty() {
        return Err(ServiceError::InvalidResponse(String::from(
            "analysis has no meaning",
        )));
    }

    Ok(AnalysisResult {
        lemma: reply.lemma.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        part_of_speech: reply
            .part_of_speech
            .as_deref()
            .and_then(PartOfSpeech::from_str),
        is_verb: reply.is_verb,
        meaning,
        language: reply
            .language
            .as_deref()
            .and_then(MeaningLanguage::from_str)
            .unwrap_or(target),
        conjugation: reply.conjugation,
        plural_form: reply.plural_form,
        gender_number_forms: reply.gender_number_forms,
    })
}

fn parse_tips(reply: &str) -> Result<Tips, ServiceError> {
    let reply: TipsReply = parse_json_reply(reply)?;
    let tips = reply.tips.trim().to_string();
    if tips.is_empty() {
        return Err(ServiceError::InvalidResponse(String::from("reply has no tips")));
    }
    Ok(Tips { tips })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn can_parse_verb_analysis() {
        let reply = r#"```json
{"lemma": "hablar", "partOfSpeech": "verb", "isVerb": true, "meaning": " to speak ",
 "language": "primary", "conjugation": {"yo": "hablo", "tu": "hablas"}}
```"#;
        let result = parse_analysis(reply, MeaningLanguage::Secondary).unwrap();
        assert_eq!(result.lemma.as_deref(), Some("hablar"));
        assert_eq!(result.part_of_speech, Some(PartOfSpeech::Verb));
        assert_eq!(result.meaning, "to speak");
        assert_eq!(result.language, MeaningLanguage::Primary);
        assert_eq!(result.conjugation.unwrap().tu, "hablas");
    }

    #[test]
    fn unknown_language_falls_back_to_target() {
        let reply = r#"{"meaning": "房子", "language": "zh"}"#;
        let result = parse_analysis(reply, MeaningLanguage::Secondary).unwrap();
        assert_eq!(result.language, MeaningLanguage::Secondary);
        assert_eq!(result.part_of_speech, None);
    }

    #[test]
    fn analysis_without_meaning_is_invalid() {
        let reply = r#"{"lemma": "casa"}"#;
        let err = parse_analysis(reply, MeaningLanguage::Primary).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[test]
    fn malformed_reply_is_parse_failure() {
        let reply = "the word means house";
        let err = parse_analysis(reply, MeaningLanguage::Primary).unwrap_err();
        assert!(matches!(err, ServiceError::ParseFailure(_)));
        let err = parse_tips("{\"tips\": 3}").unwrap_err();
        assert!(matches!(err, ServiceError::ParseFailure(_)));
    }

    #[test]
    fn into_draft_prefers_lemma_and_derives_verb() {
        let result = AnalysisResult {
            lemma: Some(String::from("comer")),
            part_of_speech: None,
            is_verb: Some(true),
            meaning: String::from("to eat"),
            language: MeaningLanguage::Primary,
            conjugation: None,
            plural_form: None,
            gender_number_forms: None,
        };
        let draft = result.into_draft("como", Some(String::from("Memory tip: eat")));
        assert_eq!(draft.headword, "comer");
        assert_eq!(draft.part_of_speech, PartOfSpeech::Verb);
        assert_eq!(draft.memory_tip.as_deref(), Some("Memory tip: eat"));
    }

    #[test]
    fn extracts_reply_text_by_provider() {
        let openai = json!({
            "choices": [{"message": {"content": " {\"tips\": \"x\"} "}}]
        });
        assert_eq!(extract_reply_text("openai", &openai).unwrap(), "{\"tips\": \"x\"}");

        let anthropic = json!({"content": [{"type": "text", "text": "hi"}]});
        assert_eq!(extract_reply_text("anthropic", &anthropic).unwrap(), "hi");

        let err = extract_reply_text("openai", &anthropic).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[test]
    fn endpoint_depends_on_provider_and_base_url() {
        let mut config = LlmConfig::default();
        assert_eq!(endpoint_url(&config), "https://api.openai.com/v1/chat/completions");
        config.base_url = String::from("http://localhost:11434/");
        assert_eq!(endpoint_url(&config), "http://localhost:11434/v1/chat/completions");
        config.provider = String::from("anthropic");
        config.base_url = String::new();
        assert_eq!(endpoint_url(&config), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let config = LlmConfig {
            api_key_env: String::from("VOCAB_TEST_UNSET_KEY"),
            ..LlmConfig::default()
        };
        std::env::remove_var("VOCAB_TEST_UNSET_KEY");
        let client = LlmClient::new(config, LanguageConfig::default()).unwrap();
        let draft = WordDraft::new("casa", "house");
        let word = WordRecord::new(draft, Utc::now()).unwrap();
        assert_eq!(client.generate_tips(&word), Err(ServiceError::MissingCredential));
        assert_eq!(
            client.analyze("casa", MeaningLanguage::Primary).map(|r| r.meaning),
            Err(ServiceError::MissingCredential)
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&body, MAX_ERROR_BODY).len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short", MAX_ERROR_BODY), "short");
    }
}
