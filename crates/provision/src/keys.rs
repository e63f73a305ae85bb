//! Secret key set provider.
//!
//! The key block (salts and auth keys) is generated once per lineage by an
//! external service. A block already present in the context is never
//! regenerated, and a failed fetch aborts the run: rendering with empty key
//! material would publish an insecure artifact.

use crate::error::ProviderError;
use crate::types::{Origin, RenderContext, SecretKeySet, vars};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default generator endpoint (plaintext `define(...)` lines).
pub const DEFAULT_KEY_ENDPOINT: &str = "https://api.wordpress.org/secret-key/1.1/salt/";

/// Source of fresh key material.
pub trait KeySource {
    /// Endpoint or description, for messages.
    fn endpoint(&self) -> &str;

    /// Fetch a fresh key block.
    fn fetch(&self) -> Result<String, ProviderError>;
}

/// Blocking HTTP(S) generator client.
///
/// # Example
///
/// ```no_run
/// use provision::{HttpKeySource, KeySource, DEFAULT_KEY_ENDPOINT};
/// use std::time::Duration;
///
/// let source = HttpKeySource::new(DEFAULT_KEY_ENDPOINT, Duration::from_secs(30));
/// let block = source.fetch().unwrap();
/// assert!(block.contains("AUTH_KEY"));
/// ```
pub struct HttpKeySource {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpKeySource {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl KeySource for HttpKeySource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fetch(&self) -> Result<String, ProviderError> {
        log::debug!("Fetching key block from {}", self.endpoint);

        let mut response = self
            .agent
            .get(&self.endpoint)
            .header("User-Agent", concat!("confseed/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| ProviderError::from_ureq(&self.endpoint, e))?;

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| ProviderError::from_ureq(&self.endpoint, e))
    }
}

/// Fixed key block for tests and pre-generated material.
///
/// Counts fetches; clones share the counter.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    block: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StaticKeySource {
    /// Source that always returns `block`.
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: Some(block.into()),
            calls: Arc::default(),
        }
    }

    /// Source that behaves like an unreachable endpoint.
    pub fn unavailable() -> Self {
        Self {
            block: None,
            calls: Arc::default(),
        }
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeySource for StaticKeySource {
    fn endpoint(&self) -> &str {
        "static"
    }

    fn fetch(&self) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.block
            .clone()
            .ok_or_else(|| ProviderError::unavailable("static", "connection refused"))
    }
}

/// Obtain the key set for this run.
///
/// Returns the block already in the context if there is one, otherwise
/// fetches and stores a fresh block with origin [`Origin::Generated`].
pub fn obtain(
    ctx: &mut RenderContext,
    source: &dyn KeySource,
) -> Result<SecretKeySet, ProviderError> {
    if let Some(existing) = ctx.get(vars::SECURITY_KEYS).and_then(SecretKeySet::new) {
        log::debug!("Key block already present, not regenerating");
        return Ok(existing);
    }

    let block = source.fetch()?;
    let keys = SecretKeySet::new(block).ok_or_else(|| ProviderError::EmptyResponse {
        endpoint: source.endpoint().to_string(),
    })?;

    log::info!("Generated key block from {}", source.endpoint());
    ctx.set_if_unset(vars::SECURITY_KEYS, keys.as_str(), Origin::Generated);
    Ok(keys)
}
