//! Decoding LLM output into wire replies.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

/// Removes a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parses LLM text as `T`, tolerating a code fence around the JSON.
#[instrument(skip(raw), fields(raw_len = raw.len()))]
pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let body = strip_code_fence(raw);
    debug!(body_len = body.len(), "Parsing LLM reply");
    serde_json::from_str(body).inspect_err(|e| warn!(error = %e, "LLM reply is not valid JSON"))
}
