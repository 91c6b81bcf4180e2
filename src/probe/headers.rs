use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tracing::warn;

use crate::config::{ProviderEndpoint, ProviderKind};

const ANTHROPIC_KEY_HEADER: &str = "x-api-key";

/// Headers sent with a health request.
///
/// Authentication follows the provider kind:
/// - `openai`, `azure`: `Authorization: Bearer <key>`
/// - `anthropic`: `x-api-key: <key>`
/// - anything else: `Authorization: <key>` verbatim
///
/// Extra headers are applied afterwards, except that an extra
/// `Authorization` header is ignored whenever an API key is configured.
pub(super) fn health_headers(endpoint: &ProviderEndpoint) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let api_key = endpoint.api_key.as_str();

    if !api_key.is_empty() {
        let (name, value) = match endpoint.kind {
            ProviderKind::OpenAi | ProviderKind::Azure => {
                (AUTHORIZATION, format!("Bearer {}", api_key))
            }
            ProviderKind::Anthropic => (
                HeaderName::from_static(ANTHROPIC_KEY_HEADER),
                api_key.to_string(),
            ),
            ProviderKind::Other => (AUTHORIZATION, api_key.to_string()),
        };
        match HeaderValue::from_str(&value) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(name, value);
            }
            Err(_) => warn!(
                "API key for {} is not a valid header value; sending unauthenticated request",
                endpoint.display_name()
            ),
        }
    }

    for (name, value) in &endpoint.extra_headers {
        if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) && !api_key.is_empty() {
            continue;
        }
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        match parsed {
            Some((name, value)) => {
                headers.insert(name, value);
            }
            None => warn!(
                "Skipping invalid extra header {:?} for {}",
                name,
                endpoint.display_name()
            ),
        }
    }

    headers
}
