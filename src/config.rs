/**
 * Application configuration, read from `config.json` in the application directory.
 *
 * A missing file means the defaults. Only the *name* of the environment variable that
 * holds the API key is stored here, never the key itself.
 */
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::common::{Result, VocabError};
use super::word::MeaningLanguage;

const APP_DIR_NAME: &str = "vocab";
const CONFIG_FILE: &str = "config.json";
const WORDS_FILE: &str = "words.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Words per study session when `-n` is not given.
    pub session_size: usize,
    pub languages: LanguageConfig,
    pub llm: LlmConfig,
    /// An `env_logger` filter, e.g. "info" or "vocab=debug". `RUST_LOG` wins if set.
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session_size: 10,
            languages: LanguageConfig::default(),
            llm: LlmConfig::default(),
            log_level: None,
        }
    }
}

/// Display names of the language being learned and the two meaning languages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LanguageConfig {
    pub learning: String,
    pub primary: String,
    pub secondary: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        LanguageConfig {
            learning: String::from("Spanish"),
            primary: String::from("English"),
            secondary: String::from("Chinese"),
        }
    }
}

impl LanguageConfig {
    pub fn name(&self, language: MeaningLanguage) -> &str {
        match language {
            MeaningLanguage::Primary => &self.primary,
            MeaningLanguage::Secondary => &self.secondary,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    /// "openai" (or any OpenAI-compatible server), "openrouter" or "anthropic".
    pub provider: String,
    /// Empty for the provider's public endpoint.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            provider: String::from("openai"),
            base_url: String::new(),
            model: String::from("gpt-4o-mini"),
            api_key_env: String::from("VOCAB_API_KEY"),
            timeout_seconds: 30,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the environment. An unset or blank variable is `None`.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    pub fn load(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|e| {
                VocabError::InvalidConfig(format!("{}: {}", path.display(), e))
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_size == 0 {
            return Err(VocabError::InvalidConfig(String::from(
                "sessionSize must be at least 1",
            )));
        }
        match self.llm.provider.as_str() {
            "openai" | "openrouter" | "anthropic" => Ok(()),
            other => {
                Err(VocabError::InvalidConfig(format!("unknown provider '{}'", other)))
            }
        }
    }
}

/// Return the directory the application keeps its files in, creating it if needed.
pub fn require_app_dir_path(directory: Option<&Path>) -> Result<PathBuf> {
    let dir = get_app_dir_path(directory);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

pub fn get_app_dir_path(directory: Option<&Path>) -> PathBuf {
    if let Some(directory) = directory {
        return directory.to_path_buf();
    }
    let mut dirpath = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    dirpath.push(APP_DIR_NAME);
    dirpath
}

pub fn get_words_path(dir: &Path) -> PathBuf {
    dir.join(WORDS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"sessionSize": 4,
                "llm": {"provider": "anthropic", "model": "claude-3-5-haiku-latest"}}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.session_size, 4);
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "VOCAB_API_KEY");
        assert_eq!(config.languages.name(MeaningLanguage::Secondary), "Chinese");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = r#"{"llm": {"provider": "carrier-pigeon"}}"#;
        fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
        let loaded = Config::load(dir.path());
        assert!(matches!(loaded, Err(VocabError::InvalidConfig(_))));
    }

    #[test]
    fn explicit_directory_overrides_data_dir() {
        let dir = PathBuf::from("/tmp/somewhere");
        assert_eq!(get_app_dir_path(Some(&dir)), dir);
        assert_eq!(get_words_path(&dir), PathBuf::from("/tmp/somewhere/words.json"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let llm = LlmConfig {
            api_key_env: String::from("VOCAB_TEST_BLANK_KEY"),
            ..LlmConfig::default()
        };
        env::set_var("VOCAB_TEST_BLANK_KEY", "   ");
        assert_eq!(llm.api_key(), None);
        env::set_var("VOCAB_TEST_BLANK_KEY", "sk-123");
        assert_eq!(llm.api_key(), Some(String::from("sk-123")));
    }
}
