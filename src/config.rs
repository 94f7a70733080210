use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

pub const LLM_PROVIDERS: &[&str] = &["anthropic", "openai", "openrouter", "cerebras", "zai", "none"];
pub const EMBEDDING_PROVIDERS: &[&str] = &["openai", "fastembed", "none"];
pub const CONTENT_PROVIDERS: &[&str] = &["jina", "plain"];

const DEFAULT_LLM_PROVIDER: &str = "anthropic";
const DEFAULT_LLM_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_EMBEDDING_PROVIDER: &str = "openai";
const DEFAULT_CONTENT_PROVIDER: &str = "jina";
const DEFAULT_MAX_CONTENT_LEN: usize = 50_000;
const DEFAULT_SUMMARY_INPUT_LEN: usize = 10_000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_LIMIT: usize = 100;
const DEFAULT_REFRESH_INTERVAL_HOURS: u64 = 24;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// One of `anthropic`, `openai`, `openrouter`, `cerebras`, `zai` or `none`
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Used when the provider's API key variable is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Replaces the built-in summary prompt; must contain `{content}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key: None,
            summary_prompt: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// One of `openai`, `fastembed` or `none`
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            base_url: None,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "enabled")]
    pub x: bool,
    #[serde(default = "enabled")]
    pub raindrop: bool,
    #[serde(default = "enabled")]
    pub github: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            x: true,
            raindrop: true,
            github: true,
        }
    }
}

impl SourcesConfig {
    pub fn is_enabled(&self, source: crate::bookmarks::Source) -> bool {
        use crate::bookmarks::Source;
        match source {
            Source::X => self.x,
            Source::Raindrop => self.raindrop,
            Source::Github => self.github,
            Source::Manual => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentConfig {
    /// `jina` or `plain`
    #[serde(default = "default_content_provider")]
    pub provider: String,
    /// Stored content is cut to this many characters
    #[serde(default = "default_max_content_len")]
    pub max_content_len: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            provider: default_content_provider(),
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Most pending items enriched per sync cycle
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Characters of content handed to the summarizer
    #[serde(default = "default_summary_input_len")]
    pub summary_input_len: usize,
    /// Log raw summarizer responses
    #[serde(default)]
    pub debug: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            summary_input_len: DEFAULT_SUMMARY_INPUT_LEN,
            debug: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh in the background when a search starts and the last refresh is stale
    #[serde(default = "enabled")]
    pub auto: bool,
    #[serde(default = "default_refresh_interval_hours")]
    pub interval_hours: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto: true,
            interval_hours: DEFAULT_REFRESH_INTERVAL_HOURS,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.interval_hours as i64)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

fn enabled() -> bool {
    true
}

fn default_llm_provider() -> String {
    DEFAULT_LLM_PROVIDER.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_embedding_provider() -> String {
    DEFAULT_EMBEDDING_PROVIDER.to_string()
}

fn default_content_provider() -> String {
    DEFAULT_CONTENT_PROVIDER.to_string()
}

fn default_max_content_len() -> usize {
    DEFAULT_MAX_CONTENT_LEN
}

fn default_summary_input_len() -> usize {
    DEFAULT_SUMMARY_INPUT_LEN
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_refresh_interval_hours() -> u64 {
    DEFAULT_REFRESH_INTERVAL_HOURS
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            bail!(
                "llm.provider must be one of {}, got '{}'",
                LLM_PROVIDERS.join(", "),
                self.llm.provider
            );
        }
        if self.llm.provider != "none" && self.llm.model.trim().is_empty() {
            bail!("llm.model cannot be empty");
        }
        if let Some(prompt) = &self.llm.summary_prompt {
            if !prompt.contains("{content}") {
                bail!("llm.summary_prompt must contain a {{content}} placeholder");
            }
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embeddings.provider.as_str()) {
            bail!(
                "embeddings.provider must be one of {}, got '{}'",
                EMBEDDING_PROVIDERS.join(", "),
                self.embeddings.provider
            );
        }

        if !CONTENT_PROVIDERS.contains(&self.content.provider.as_str()) {
            bail!(
                "content.provider must be one of {}, got '{}'",
                CONTENT_PROVIDERS.join(", "),
                self.content.provider
            );
        }
        if self.content.max_content_len == 0 {
            bail!("content.max_content_len must be greater than 0");
        }
        if self.content.timeout_secs == 0 {
            bail!("content.timeout_secs must be greater than 0");
        }

        if self.pipeline.batch_limit == 0 {
            bail!("pipeline.batch_limit must be greater than 0");
        }
        if self.pipeline.summary_input_len == 0 {
            bail!("pipeline.summary_input_len must be greater than 0");
        }

        if self.refresh.interval_hours == 0 {
            bail!("refresh.interval_hours must be greater than 0");
        }

        Ok(())
    }

    /// Read `config.yaml` from `base_path`, writing the defaults first if it is missing.
    ///
    /// Environment overrides are applied on top and never written back.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let path = base_path.join(CONFIG_FILE_NAME);

        if !path.exists() {
            let defaults = serde_yml::to_string(&Self::default())?;
            std::fs::write(&path, defaults)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::parse(&config_str)?;
        config.base_path = base_path.to_path_buf();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        // An empty file is a valid, all-defaults config.
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(config_str).context("config is malformed")
    }

    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(provider) = var("XHUB_LLM_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(model) = var("XHUB_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = var("XHUB_LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.model, "claude-haiku-4-5-20251001");
        assert_eq!(config.embeddings.provider, "openai");
        assert!(config.sources.x && config.sources.raindrop && config.sources.github);
        assert_eq!(config.content.max_content_len, 50_000);
        assert_eq!(config.pipeline.batch_limit, 100);
        assert_eq!(config.refresh.interval_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::parse("sources:\n  x: false\nllm:\n  provider: openrouter\n").unwrap();
        assert!(!config.sources.x);
        assert!(config.sources.github);
        assert_eq!(config.llm.provider, "openrouter");
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.content.provider, "jina");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = Config::default();
        config.llm.provider = "gpt".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embeddings.provider = "magic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let mut config = Config::default();
        config.pipeline.batch_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.content.max_content_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prompt_override_needs_placeholder() {
        let mut config = Config::default();
        config.llm.summary_prompt = Some("Summarize please".to_string());
        assert!(config.validate().is_err());

        config.llm.summary_prompt = Some("Summarize: {content}".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("XHUB_LLM_PROVIDER", "OpenAI"),
            ("XHUB_LLM_MODEL", "gpt-4o-mini"),
            ("XHUB_LLM_BASE_URL", ""),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.llm.base_url.is_none());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(config.base_path(), dir.path());
    }
}
