//! Expansion of indirect configuration values.
//!
//! Provider fields may reference the environment (`$VAR`, `${VAR}`) or embed
//! a shell command substitution (`$(command)`). They are expanded each time
//! an endpoint is used, since the inputs can change over the process
//! lifetime.

use regex::{Captures, Regex};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ProviderEndpoint;

/// Longest a single `$(command)` substitution may run before it is killed.
pub const SUBSTITUTION_TIMEOUT: Duration = Duration::from_secs(3);

const SUBSTITUTION_POLL: Duration = Duration::from_millis(20);

/// Resolution failure for a single value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("environment variable ${0} is not set")]
    MissingVariable(String),
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
    #[error("resolution interrupted: {0}")]
    Aborted(String),
}

/// Turns a raw configured value into a literal string.
pub trait ValueResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Result<String, ResolveError>;
}

/// Resolver backed by the process environment and the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellResolver;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\(([^)]*)\)|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("placeholder pattern is valid")
    })
}

impl ShellResolver {
    fn expand(&self, caps: &Captures<'_>) -> Result<String, ResolveError> {
        if let Some(command) = caps.get(1) {
            return run_substitution(command.as_str(), SUBSTITUTION_TIMEOUT);
        }
        let name = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).map_err(|_| ResolveError::MissingVariable(name.to_string()))
    }
}

impl ValueResolver for ShellResolver {
    fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        let pattern = placeholder_pattern();
        if !pattern.is_match(raw) {
            return Ok(raw.to_string());
        }

        let mut out = String::with_capacity(raw.len());
        let mut last = 0;
        for caps in pattern.captures_iter(raw) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&raw[last..whole.start()]);
            out.push_str(&self.expand(&caps)?);
            last = whole.end();
        }
        out.push_str(&raw[last..]);
        Ok(out)
    }
}

fn run_substitution(command: &str, timeout: Duration) -> Result<String, ResolveError> {
    debug!("Resolving value via command: {}", command);
    let failed = |reason: String| ResolveError::Command {
        command: command.to_string(),
        reason,
    };

    let mut child = shell(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                if let Err(e) = child.kill() {
                    warn!("Failed to stop command `{}`: {}", command, e);
                }
                let _ = child.wait();
                return Err(failed(format!("timed out after {:?}", timeout)));
            }
            Ok(None) => std::thread::sleep(SUBSTITUTION_POLL),
            Err(e) => return Err(failed(e.to_string())),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{} ({})", output.status, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

fn resolve_or_raw(resolver: &dyn ValueResolver, field: &str, raw: &str) -> String {
    match resolver.resolve(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to resolve {}, using raw value: {}", field, e);
            raw.to_string()
        }
    }
}

/// Resolve every dynamic field of `endpoint` into a fresh copy.
///
/// Only the base URL is required to resolve; health path, API key and
/// extra headers keep their raw value on failure.
pub fn resolve_endpoint(
    resolver: &dyn ValueResolver,
    endpoint: &ProviderEndpoint,
) -> Result<ProviderEndpoint, ResolveError> {
    let mut resolved = endpoint.clone();
    resolved.base_url = resolver.resolve(&endpoint.base_url)?;
    resolved.startup_health_path = endpoint
        .startup_health_path
        .as_deref()
        .map(|path| resolve_or_raw(resolver, "health path", path));
    resolved.api_key = resolve_or_raw(resolver, "api key", &endpoint.api_key);
    resolved.extra_headers = endpoint
        .extra_headers
        .iter()
        .map(|(name, value)| {
            let field = format!("header {}", name);
            (name.clone(), resolve_or_raw(resolver, &field, value))
        })
        .collect();
    Ok(resolved)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver with a fixed variable table, for tests that must not touch
    /// the process environment.
    pub(crate) struct MapResolver(pub HashMap<&'static str, &'static str>);

    impl ValueResolver for MapResolver {
        fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
            match raw.strip_prefix('$') {
                Some(name) => self
                    .0
                    .get(name)
                    .map(|v| v.to_string())
                    .ok_or_else(|| ResolveError::MissingVariable(name.to_string())),
                None => Ok(raw.to_string()),
            }
        }
    }

    #[test]
    fn test_literal_passthrough() {
        let value = ShellResolver.resolve("http://localhost:8000").unwrap();
        assert_eq!(value, "http://localhost:8000");
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("PROVIDER_READY_TEST_HOST", "example.test");
        let resolver = ShellResolver;
        assert_eq!(
            resolver.resolve("https://$PROVIDER_READY_TEST_HOST/v1").unwrap(),
            "https://example.test/v1"
        );
        assert_eq!(
            resolver.resolve("${PROVIDER_READY_TEST_HOST}:80").unwrap(),
            "example.test:80"
        );
    }

    #[test]
    fn test_missing_variable() {
        let err = ShellResolver
            .resolve("$PROVIDER_READY_TEST_DEFINITELY_UNSET")
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingVariable("PROVIDER_READY_TEST_DEFINITELY_UNSET".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_substitution() {
        let value = ShellResolver.resolve("Bearer $(echo secret)").unwrap();
        assert_eq!(value, "Bearer secret");

        let err = ShellResolver.resolve("$(exit 4)").unwrap_err();
        assert!(matches!(err, ResolveError::Command { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_substitution_is_killed() {
        let started = Instant::now();
        let err = run_substitution("sleep 10; echo late", Duration::from_millis(200)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
        match err {
            ResolveError::Command { reason, .. } => assert!(reason.contains("timed out"), "{}", reason),
            other => panic!("expected Command error, got: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_endpoint_fallbacks() {
        let resolver = MapResolver(HashMap::from([("HOST", "http://h")]));
        let endpoint = ProviderEndpoint {
            base_url: "$HOST".to_string(),
            startup_health_path: Some("$MISSING_PATH".to_string()),
            api_key: "$MISSING_KEY".to_string(),
            extra_headers: [("X-Test".to_string(), "$MISSING".to_string())].into(),
            ..Default::default()
        };

        let resolved = resolve_endpoint(&resolver, &endpoint).unwrap();
        assert_eq!(resolved.base_url, "http://h");
        assert_eq!(resolved.startup_health_path.as_deref(), Some("$MISSING_PATH"));
        assert_eq!(resolved.api_key, "$MISSING_KEY");
        assert_eq!(resolved.extra_headers["X-Test"], "$MISSING");
    }

    #[test]
    fn test_resolve_endpoint_base_url_required() {
        let resolver = MapResolver(HashMap::new());
        let endpoint = ProviderEndpoint {
            base_url: "$NOPE".to_string(),
            ..Default::default()
        };
        assert!(resolve_endpoint(&resolver, &endpoint).is_err());
    }
}
