use crate::cli_args::Cli;
use crate::generate::{CommitType, GenerationConfig, ModelSettings};
use crate::llm::{ollama, openai};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => openai::DEFAULT_BASE_URL,
            Provider::Ollama => ollama::DEFAULT_BASE_URL,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Ollama => "llama3.2",
        }
    }
}

/// Final resolved configuration for commitsmith.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub locale: String,
    pub max_length: usize,
    pub commit_type: CommitType,
    pub generate: usize,
    pub context_lines: u32,
    pub exclude: Vec<String>,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub stream: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Default model to use when not provided via CLI or env.
    pub model: Option<String>,
    pub locale: Option<String>,
    pub max_length: Option<usize>,
    #[serde(rename = "type")]
    pub commit_type: Option<String>,
    pub generate: Option<usize>,
    pub context_lines: Option<u32>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub stream: bool,
}

fn parse_env<T: std::str::FromStr>(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{key} has an invalid value: {raw:?}")),
        None => Ok(None),
    }
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags
    ///   2. Env vars (`COMMITSMITH_*`, `OPENAI_API_KEY`)
    ///   3. TOML `~/.config/commitsmith.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = load_file_config()?.unwrap_or_default();
        Self::resolve(cli, &|key| env::var(key).ok(), file_cfg)
    }

    pub fn resolve(cli: &Cli, env: &dyn Fn(&str) -> Option<String>, file: FileConfig) -> Result<Self> {
        let provider_raw = cli
            .provider
            .clone()
            .or_else(|| env("COMMITSMITH_PROVIDER"))
            .or(file.provider)
            .unwrap_or_else(|| "openai".to_string());
        let provider = Provider::parse(&provider_raw)
            .ok_or_else(|| anyhow!("unknown provider {provider_raw:?} (expected openai or ollama)"))?;

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env("COMMITSMITH_BASE_URL"))
            .or(file.base_url)
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let model = cli
            .model
            .clone()
            .or_else(|| env("COMMITSMITH_MODEL"))
            .or(file.model)
            .unwrap_or_else(|| provider.default_model().to_string());

        let api_key = cli
            .api_key
            .clone()
            .or_else(|| env("OPENAI_API_KEY"))
            .or(file.api_key)
            .filter(|k| !k.trim().is_empty());
        if provider == Provider::OpenAi && api_key.is_none() {
            bail!("OPENAI_API_KEY must be set via env var, --api-key, or the config file");
        }

        let locale = cli
            .locale
            .clone()
            .or_else(|| env("COMMITSMITH_LOCALE"))
            .or(file.locale)
            .unwrap_or_else(|| "en".to_string());
        if locale.len() != 2 || !locale.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("locale must be a two-letter language code, got {locale:?}");
        }

        let max_length = match cli.max_length {
            Some(v) => v,
            None => parse_env(env, "COMMITSMITH_MAX_LENGTH")?
                .or(file.max_length)
                .unwrap_or(50),
        };
        if max_length == 0 {
            bail!("max_length must be greater than 0");
        }

        let type_raw = cli
            .commit_type
            .clone()
            .or_else(|| env("COMMITSMITH_TYPE"))
            .or(file.commit_type)
            .unwrap_or_default();
        let commit_type = CommitType::parse(&type_raw)
            .ok_or_else(|| anyhow!("type must be \"conventional\" or empty, got {type_raw:?}"))?;

        let generate = match cli.generate {
            Some(v) => v,
            None => parse_env(env, "COMMITSMITH_GENERATE")?
                .or(file.generate)
                .unwrap_or(1),
        };
        if !(1..=5).contains(&generate) {
            bail!("generate must be between 1 and 5, got {generate}");
        }

        let context_lines = match cli.context_lines {
            Some(v) => v,
            None => parse_env(env, "COMMITSMITH_CONTEXT_LINES")?
                .or(file.context_lines)
                .unwrap_or(3),
        };

        let exclude = if cli.exclude.is_empty() {
            file.exclude
        } else {
            cli.exclude.clone()
        };

        Ok(Config {
            provider,
            api_key,
            base_url,
            model,
            locale: locale.to_ascii_lowercase(),
            max_length,
            commit_type,
            generate,
            context_lines,
            exclude,
            temperature: file.temperature,
            reasoning_effort: file.reasoning_effort,
            max_tokens: file.max_tokens,
            timeout: file.timeout_secs.map(Duration::from_secs),
            stream: cli.stream || file.stream,
        })
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            locale: self.locale.clone(),
            max_length: self.max_length,
            commit_type: self.commit_type,
            generate: self.generate,
            context_lines: self.context_lines,
            exclude: self.exclude.clone(),
        }
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            reasoning_effort: self.reasoning_effort.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

/// Return `~/.config/commitsmith.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("commitsmith.toml"))
}

fn load_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(&path).with_context(|| format!("failed to read {path:?}"))?;
    let cfg = toml::from_str::<FileConfig>(&data).with_context(|| format!("failed to parse {path:?}"))?;
    log::debug!("Loaded config file {path:?}");
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn keyed() -> Vec<(&'static str, &'static str)> {
        vec![("OPENAI_API_KEY", "sk-test")]
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::resolve(&Cli::default(), &env_of(&keyed()), FileConfig::default()).unwrap();
        assert_eq!(cfg.provider, Provider::OpenAi);
        assert_eq!(cfg.base_url, "https://api.openai.com");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.locale, "en");
        assert_eq!(cfg.max_length, 50);
        assert_eq!(cfg.commit_type, CommitType::Plain);
        assert_eq!(cfg.generate, 1);
        assert_eq!(cfg.context_lines, 3);
        assert!(cfg.timeout.is_none());
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file: FileConfig = toml::from_str(
            r#"
            model = "from-file"
            locale = "fr"
            type = "conventional"
            generate = 4
            exclude = ["dist/*"]
            timeout_secs = 30
            "#,
        )
        .unwrap();
        let mut pairs = keyed();
        pairs.push(("COMMITSMITH_MODEL", "from-env"));
        pairs.push(("COMMITSMITH_GENERATE", "2"));
        let cli = Cli {
            model: Some("from-cli".into()),
            ..Default::default()
        };

        let cfg = Config::resolve(&cli, &env_of(&pairs), file).unwrap();
        assert_eq!(cfg.model, "from-cli");
        assert_eq!(cfg.generate, 2);
        assert_eq!(cfg.locale, "fr");
        assert_eq!(cfg.commit_type, CommitType::Conventional);
        assert_eq!(cfg.exclude, vec!["dist/*"]);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn ollama_needs_no_key_and_has_its_own_defaults() {
        let cli = Cli {
            provider: Some("ollama".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(&cli, &env_of(&[]), FileConfig::default()).unwrap();
        assert_eq!(cfg.base_url, "http://localhost:11434");
        assert_eq!(cfg.model, "llama3.2");
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let env = env_of(&keyed());
        let cases = [
            Cli { locale: Some("eng".into()), ..Default::default() },
            Cli { max_length: Some(0), ..Default::default() },
            Cli { generate: Some(6), ..Default::default() },
            Cli { commit_type: Some("gitmoji".into()), ..Default::default() },
            Cli { provider: Some("bard".into()), ..Default::default() },
        ];
        for cli in cases {
            assert!(Config::resolve(&cli, &env, FileConfig::default()).is_err(), "{cli:?}");
        }

        assert!(Config::resolve(&Cli::default(), &env_of(&[]), FileConfig::default()).is_err());
        let bad_env = env_of(&[("OPENAI_API_KEY", "k"), ("COMMITSMITH_MAX_LENGTH", "lots")]);
        assert!(Config::resolve(&Cli::default(), &bad_env, FileConfig::default()).is_err());
    }

    #[test]
    fn generation_config_mirrors_settings() {
        let cli = Cli {
            locale: Some("DE".into()),
            generate: Some(3),
            ..Default::default()
        };
        let cfg = Config::resolve(&cli, &env_of(&keyed()), FileConfig::default()).unwrap();
        let generation = cfg.generation();
        assert_eq!(generation.locale, "de");
        assert_eq!(generation.generate, 3);
        assert_eq!(cfg.model_settings().model, "gpt-4o-mini");
    }
}
