//! Model discovery: list, filter and pick chat models for a backend.

use super::{LlmClient, ModelChoice};
use crate::error::{Error, Result};
use reqwest::Url;
use std::collections::HashSet;

/// Hosts whose model lists mix chat models with other product lines.
const VENDOR_HOSTED: &[&str] = &["api.openai.com"];

/// Substrings (lowercase) marking models that cannot serve chat completions.
const NON_CHAT_MARKERS: &[&str] = &[
    "image",
    "dall-e",
    "audio",
    "tts",
    "whisper",
    "embedding",
    "transcribe",
    "transcription",
    "search",
    "realtime",
    "preview",
    "moderation",
];

fn host_of(base_url: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

pub fn is_vendor_hosted(base_url: &str) -> bool {
    host_of(base_url).is_some_and(|host| VENDOR_HOSTED.contains(&host.as_str()))
}

pub fn is_chat_model(id: &str) -> bool {
    let id = id.to_ascii_lowercase();
    !NON_CHAT_MARKERS.iter().any(|marker| id.contains(marker))
}

/// Drop duplicate ids and, against a vendor-hosted endpoint, non-chat models.
pub fn filter_models(base_url: &str, models: Vec<ModelChoice>) -> Vec<ModelChoice> {
    let hosted = is_vendor_hosted(base_url);
    let mut seen = HashSet::new();

    models
        .into_iter()
        .filter(|m| !hosted || is_chat_model(&m.id))
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

/// List the chat models a client can use.
pub fn discover(client: &dyn LlmClient) -> Result<Vec<ModelChoice>> {
    let raw = client.list_models()?;
    let total = raw.len();
    let models = filter_models(client.base_url(), raw);
    log::debug!(
        "{} advertised {total} models, {} usable for chat",
        client.backend(),
        models.len()
    );
    Ok(models)
}

/// The previously configured model if it is still offered, else the first entry.
pub fn default_model<'a>(models: &'a [ModelChoice], prior: Option<&str>) -> Result<&'a ModelChoice> {
    if let Some(found) = prior.and_then(|id| models.iter().find(|m| m.id == id)) {
        return Ok(found);
    }
    models
        .first()
        .ok_or_else(|| Error::validation("no models available from this endpoint"))
}

pub fn find_model<'a>(models: &'a [ModelChoice], id: &str) -> Result<&'a ModelChoice> {
    if models.is_empty() {
        return Err(Error::validation("no models available from this endpoint"));
    }
    models
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| Error::validation(format!("unrecognized model id {id:?}")))
}
