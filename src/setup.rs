use crate::config::{Config, Provider};
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;
use crate::llm::LlmClient;
use anyhow::{anyhow, Context, Result};
use log::debug;

/// Build the LLM client based on CLI + config.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    let client: Box<dyn LlmClient> = match cfg.provider {
        Provider::OpenAi => {
            let key = cfg
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY (or --api-key) is required for the openai provider"))?;
            debug!("Using OpenAiClient at {} with model: {}", cfg.base_url, cfg.model);
            Box::new(
                OpenAiClient::new(key, cfg.base_url.clone(), cfg.timeout)
                    .context("failed to build the OpenAI client")?,
            )
        }
        Provider::Ollama => {
            debug!("Using OllamaClient at {} with model: {}", cfg.base_url, cfg.model);
            Box::new(
                OllamaClient::new(cfg.base_url.clone(), cfg.timeout)
                    .context("failed to build the Ollama client")?,
            )
        }
    };
    Ok(client)
}
