//! Readiness types shared across modules.
//!
//! The prober produces [`ReadinessResult`] values, the status monitor wraps
//! them in [`ReadinessSnapshot`]s for the front end. Keeping them here avoids
//! a dependency from the probe module onto the status module.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::ProbeError;

/// Detail reported when an endpoint has nothing to probe.
pub const NO_BASE_URL_DETAIL: &str = "no base URL configured";

/// Outcome of a single health probe.
///
/// `ready == false` with a `detail` is the routine "unreachable" case.
/// `error` is only set for misconfiguration that prevented a request from
/// being built at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessResult {
    pub ready: bool,
    pub detail: String,
    pub error: Option<ProbeError>,
}

impl ReadinessResult {
    pub fn ready() -> Self {
        Self {
            ready: true,
            detail: String::new(),
            error: None,
        }
    }

    pub fn not_ready(detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            detail: detail.into(),
            error: None,
        }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self {
            ready: false,
            detail: String::new(),
            error: Some(error),
        }
    }

    /// Endpoint without a base URL: nothing to check.
    pub fn unchecked() -> Self {
        Self {
            ready: true,
            detail: NO_BASE_URL_DETAIL.to_string(),
            error: None,
        }
    }
}

/// Readiness of the active provider/model pairing, as cached by the status
/// monitor.
///
/// A snapshot with `ready == true` always carries an empty `detail`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessSnapshot {
    pub provider_id: String,
    pub provider_name: String,
    pub model_id: String,
    pub model_name: String,
    pub base_url: String,
    pub ready: bool,
    pub detail: String,
    pub stream_enabled: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ReadinessSnapshot {
    /// Fold a probe result into the snapshot, keeping the ready/detail
    /// invariant.
    pub fn apply(&mut self, result: ReadinessResult) {
        if let Some(err) = result.error {
            self.ready = false;
            self.detail = err.to_string();
        } else if result.ready {
            self.ready = true;
            self.detail.clear();
        } else {
            self.ready = false;
            self.detail = result.detail;
        }
    }
}

/// Kind of readiness event published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessEventKind {
    Updated,
}

/// Event carrying a freshly computed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessEvent {
    pub kind: ReadinessEventKind,
    pub snapshot: ReadinessSnapshot,
}

impl ReadinessEvent {
    pub fn updated(snapshot: ReadinessSnapshot) -> Self {
        Self {
            kind: ReadinessEventKind::Updated,
            snapshot,
        }
    }
}
