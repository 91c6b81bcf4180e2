use url::Url;

use super::ProbeError;
use crate::config::ProviderEndpoint;

/// Health path probed when the provider does not override it.
pub const DEFAULT_HEALTH_PATH: &str = "/models";

/// Build the readiness URL for a provider from its base URL and optional
/// health path.
///
/// Trailing slashes on the base and leading slashes on the path collapse to
/// a single separator.
pub fn build_health_url(endpoint: &ProviderEndpoint) -> Result<String, ProbeError> {
    let base_url = endpoint.base_url.trim();
    if base_url.is_empty() {
        return Err(ProbeError::MissingBaseUrl);
    }
    let base_url = base_url.trim_end_matches('/');

    let health_path = endpoint
        .startup_health_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .unwrap_or(DEFAULT_HEALTH_PATH);

    Ok(format!(
        "{}/{}",
        base_url,
        health_path.trim_start_matches('/')
    ))
}

/// Build and validate the health URL.
pub(super) fn parse_health_url(endpoint: &ProviderEndpoint) -> Result<Url, ProbeError> {
    let raw = build_health_url(endpoint)?;
    Url::parse(&raw).map_err(|e| ProbeError::InvalidUrl {
        url: raw,
        reason: e.to_string(),
    })
}
