use crate::{
    app::{service::AppService, sync::SyncCoordinator},
    config::Config,
    enrich::{
        providers::{
            anthropic::AnthropicSummarizer,
            jina::JinaFetcher,
            openai::{OpenAiEmbedder, OpenAiSummarizer, DEFAULT_EMBEDDING_MODEL, OPENAI_BASE_URL, OPENROUTER_BASE_URL},
            plain::PlainFetcher,
            resolve_api_key, ContentFetcher, Embedder, Summarizer, SUMMARY_PROMPT,
        },
        Pipeline, PipelineConfig,
    },
    semantic::{EmbeddingModel, SearchService, DEFAULT_MODEL},
    sources::{self, CommandRunner, SourceAdapter, SystemRunner},
    store::Store,
};
use anyhow::{anyhow, Context, Result};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Summaries are slower than page fetches.
const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds the application from the on-disk configuration.
pub struct AppFactory;

impl AppFactory {
    pub fn create_app_service(paths: &AppPaths) -> Result<AppService> {
        let config = Config::load_with(&paths.base_path)?;
        let store = Arc::new(Store::open(&paths.base_path).context("Failed to open database")?);
        Self::create_with(config, store, Arc::new(SystemRunner), paths)
    }

    /// Wire every component around an opened store.
    pub fn create_with(
        config: Config,
        store: Arc<Store>,
        runner: Arc<dyn CommandRunner>,
        paths: &AppPaths,
    ) -> Result<AppService> {
        let fetcher = Self::create_fetcher(&config)?;
        let summarizer = Self::create_summarizer(&config)?;
        let embedder = Self::create_embedder(&config, paths);

        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            fetcher,
            summarizer,
            embedder.clone(),
            Self::pipeline_config(&config),
        ));

        let adapters: Vec<Arc<dyn SourceAdapter>> = sources::all_adapters(store.clone(), runner)
            .into_iter()
            .filter(|adapter| config.sources.is_enabled(adapter.kind()))
            .collect();

        let sync = Arc::new(
            SyncCoordinator::new(store.clone(), adapters, pipeline.clone())
                .with_lock_dir(paths.base_path.clone()),
        );
        let search = SearchService::new(store.clone(), embedder);

        Ok(AppService::new(config, store, pipeline, sync, search))
    }

    pub fn pipeline_config(config: &Config) -> PipelineConfig {
        PipelineConfig {
            max_content_len: config.content.max_content_len,
            summary_input_len: config.pipeline.summary_input_len,
            debug: config.pipeline.debug,
        }
    }

    fn create_fetcher(config: &Config) -> Result<Arc<dyn ContentFetcher>> {
        let timeout = Duration::from_secs(config.content.timeout_secs);
        let fetcher: Arc<dyn ContentFetcher> = match config.content.provider.as_str() {
            "plain" => Arc::new(PlainFetcher::new(timeout)?),
            _ => Arc::new(JinaFetcher::new(timeout)?),
        };
        Ok(fetcher)
    }

    /// `None` when summaries are turned off or no API key is around.
    fn create_summarizer(config: &Config) -> Result<Option<Arc<dyn Summarizer>>> {
        let llm = &config.llm;
        let provider = llm.provider.as_str();
        if provider == "none" {
            return Ok(None);
        }

        let env_var = api_key_var(provider);
        let Some(api_key) = resolve_api_key(env_var, llm.api_key.as_deref()) else {
            log::warn!("{env_var} is not set, summaries are disabled");
            return Ok(None);
        };

        let prompt = llm.summary_prompt.clone().unwrap_or_else(|| SUMMARY_PROMPT.to_string());
        let debug = config.pipeline.debug;

        let summarizer: Arc<dyn Summarizer> = match provider {
            "anthropic" => Arc::new(AnthropicSummarizer::new(
                api_key,
                llm.base_url.clone(),
                llm.model.clone(),
                prompt,
                LLM_TIMEOUT,
                debug,
            )?),
            _ => {
                let base_url = match (&llm.base_url, provider) {
                    (Some(base_url), _) => base_url.clone(),
                    (None, "openai") => OPENAI_BASE_URL.to_string(),
                    (None, "openrouter") => OPENROUTER_BASE_URL.to_string(),
                    (None, other) => return Err(anyhow!("llm.base_url is required for the {other} provider")),
                };
                Arc::new(OpenAiSummarizer::new(
                    provider,
                    api_key,
                    base_url,
                    llm.model.clone(),
                    prompt,
                    LLM_TIMEOUT,
                    debug,
                )?)
            }
        };
        Ok(Some(summarizer))
    }

    /// `None` when embeddings are off or the provider cannot be set up.
    fn create_embedder(config: &Config, paths: &AppPaths) -> Option<Arc<dyn Embedder>> {
        let embeddings = &config.embeddings;
        match embeddings.provider.as_str() {
            "openai" => {
                let Some(api_key) = resolve_api_key("OPENAI_API_KEY", embeddings.api_key.as_deref()) else {
                    log::warn!("OPENAI_API_KEY is not set, embeddings are disabled");
                    return None;
                };
                let model = embeddings
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
                let timeout = Duration::from_secs(config.content.timeout_secs);
                match OpenAiEmbedder::new(api_key, embeddings.base_url.clone(), model, timeout) {
                    Ok(embedder) => Some(Arc::new(embedder) as Arc<dyn Embedder>),
                    Err(err) => {
                        log::warn!("embeddings are disabled: {err:#}");
                        None
                    }
                }
            }
            "fastembed" => {
                let model = embeddings.model.as_deref().unwrap_or(DEFAULT_MODEL);
                match EmbeddingModel::new(model, paths.cache_dir()) {
                    Ok(model) => Some(Arc::new(model) as Arc<dyn Embedder>),
                    Err(err) => {
                        log::warn!("embeddings are disabled: {err}");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    pub fn get_paths() -> Result<AppPaths> {
        let base_path = match std::env::var("XHUB_BASE_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                let home = my_home()
                    .context("Could not determine home directory")?
                    .context("Home directory path is empty")?;
                home.join(".local/share/xhub")
            }
        };

        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths { base_path })
    }
}

/// Conventional API key variable for an LLM provider.
pub fn api_key_var(provider: &str) -> &'static str {
    match provider {
        "openai" => "OPENAI_API_KEY",
        "openrouter" => "OPENROUTER_API_KEY",
        "cerebras" => "CEREBRAS_API_KEY",
        "zai" => "ZAI_API_KEY",
        _ => "ANTHROPIC_API_KEY",
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
}

impl AppPaths {
    pub fn cache_dir(&self) -> PathBuf {
        self.base_path.join("cache")
    }
}
