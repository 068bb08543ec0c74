//! Chemical registry clients
//!
//! The primary registry exposes search + detail endpoints keyed by
//! registry number; a secondary public compound service supplies synonyms
//! when the primary detail carries no usable descriptive name. The upstream
//! registry enforces a request-spacing contract, so the spacing is applied
//! inside the client; no caller can bypass it.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const COMMON_CHEMISTRY_BASE_URL: &str = "https://commonchemistry.cas.org/api";
const PUBCHEM_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
const USER_AGENT: &str = "materia/0.1.0 (https://github.com/nrgforge/materia)";

/// Mandatory spacing between registry calls. An upstream contract, not a
/// tuning knob.
const RATE_LIMIT_MS: u64 = 1100;
/// Per-request timeout so a stalled upstream cannot stall a whole batch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Detail synonyms are capped to the top entries.
const MAX_SYNONYMS: usize = 10;
/// Secondary-service synonyms considered by callers.
pub const SYNONYM_SCAN_LIMIT: usize = 50;
/// Terms shorter than this are a guaranteed miss upstream.
const MIN_TERM_LEN: usize = 3;

/// Registry client errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// A successful registry resolution: identifier plus capped synonym list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMatch {
    /// Registry number (e.g. a CAS RN).
    pub identifier: String,
    /// Synonyms from the detail endpoint, capped to the top entries.
    pub synonyms: Vec<String>,
}

impl RegistryMatch {
    pub fn new(identifier: impl Into<String>, synonyms: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            synonyms,
        }
    }

    /// Pipe-joined synonym string as persisted on records; `"N/A"` when empty.
    pub fn synonym_string(&self) -> String {
        if self.synonyms.is_empty() {
            "N/A".to_string()
        } else {
            self.synonyms.join("|")
        }
    }
}

/// Rate limiter enforcing the upstream request-spacing contract.
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the spacing contract.
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Primary registry lookup: search a free-text term, fetch detail synonyms.
#[async_trait]
pub trait ChemicalRegistry: Send + Sync {
    /// Search for a term and, on a hit, fetch its synonyms.
    ///
    /// `Ok(None)` is a clean miss; `Err` is a transient/protocol failure the
    /// caller treats as "no result" for the current trial.
    async fn search_and_detail(&self, term: &str) -> Result<Option<RegistryMatch>, RegistryError>;
}

/// Secondary synonym lookup keyed by an already-resolved identifier.
#[async_trait]
pub trait SynonymSource: Send + Sync {
    async fn synonyms(&self, identifier: &str) -> Result<Vec<String>, RegistryError>;
}

// ---------------------------------------------------------------------------
// Common Chemistry client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    rn: String,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    synonyms: Vec<String>,
}

/// HTTP client for the Common Chemistry registry API.
pub struct CommonChemistryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl CommonChemistryClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: COMMON_CHEMISTRY_BASE_URL.to_string(),
            api_key: api_key.into(),
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChemicalRegistry for CommonChemistryClient {
    async fn search_and_detail(&self, term: &str) -> Result<Option<RegistryMatch>, RegistryError> {
        let term = term.trim();
        if term.len() < MIN_TERM_LEN {
            return Ok(None);
        }

        self.rate_limiter.wait().await;

        let url = format!("{}/search", self.base_url);
        tracing::debug!(term = %term, "querying registry search");
        let response = self
            .http
            .get(&url)
            .query(&[("q", term)])
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api(status.as_u16(), body));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;

        let Some(first) = search.results.first().filter(|_| search.count > 0) else {
            return Ok(None);
        };
        let rn = first.rn.clone();

        // Detail call is spaced like any other registry call. A detail
        // failure degrades to an identifier without synonyms rather than
        // discarding the hit.
        self.rate_limiter.wait().await;

        let url = format!("{}/detail", self.base_url);
        let detail = self
            .http
            .get(&url)
            .query(&[("cas_rn", rn.as_str())])
            .header("x-api-key", &self.api_key)
            .send()
            .await;

        let synonyms = match detail {
            Ok(resp) if resp.status().is_success() => match resp.json::<DetailResponse>().await {
                Ok(d) => d.synonyms.into_iter().take(MAX_SYNONYMS).collect(),
                Err(e) => {
                    tracing::warn!(rn = %rn, error = %e, "registry detail parse failed");
                    Vec::new()
                }
            },
            Ok(resp) => {
                tracing::warn!(rn = %rn, status = %resp.status(), "registry detail failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(rn = %rn, error = %e, "registry detail failed");
                Vec::new()
            }
        };

        tracing::info!(term = %term, rn = %rn, "registry hit");
        Ok(Some(RegistryMatch::new(rn, synonyms)))
    }
}

// ---------------------------------------------------------------------------
// PubChem synonym client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PubChemResponse {
    #[serde(rename = "InformationList")]
    information_list: PubChemInformationList,
}

#[derive(Debug, Deserialize)]
struct PubChemInformationList {
    #[serde(rename = "Information", default)]
    information: Vec<PubChemInformation>,
}

#[derive(Debug, Deserialize)]
struct PubChemInformation {
    #[serde(rename = "Synonym", default)]
    synonym: Vec<String>,
}

/// HTTP client for the PubChem compound-synonym service.
pub struct PubChemClient {
    http: reqwest::Client,
    base_url: String,
}

impl PubChemClient {
    pub fn new() -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: PUBCHEM_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SynonymSource for PubChemClient {
    async fn synonyms(&self, identifier: &str) -> Result<Vec<String>, RegistryError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/compound/name/{}/synonyms/JSON", self.base_url, identifier);
        tracing::debug!(identifier = %identifier, "querying synonym service");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api(status.as_u16(), body));
        }

        let parsed: PubChemResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;

        Ok(parsed
            .information_list
            .information
            .into_iter()
            .flat_map(|i| i.synonym)
            .take(SYNONYM_SCAN_LIMIT)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Mock registry for tests: scripted matches and failures, recorded calls.
#[derive(Default)]
pub struct MockRegistry {
    matches: HashMap<String, RegistryMatch>,
    failures: Vec<String>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a match for an exact term.
    pub fn with_match(
        mut self,
        term: impl Into<String>,
        identifier: impl Into<String>,
        synonyms: &[&str],
    ) -> Self {
        self.matches.insert(
            term.into(),
            RegistryMatch::new(identifier, synonyms.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    /// Make lookups for an exact term fail with a network error.
    pub fn with_failure(mut self, term: impl Into<String>) -> Self {
        self.failures.push(term.into());
        self
    }

    /// Terms looked up so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock poisoned").clone()
    }
}

#[async_trait]
impl ChemicalRegistry for MockRegistry {
    async fn search_and_detail(&self, term: &str) -> Result<Option<RegistryMatch>, RegistryError> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push(term.to_string());
        if self.failures.iter().any(|t| t == term) {
            return Err(RegistryError::Network(format!(
                "mock failure for '{term}'"
            )));
        }
        if term.trim().len() < MIN_TERM_LEN {
            return Ok(None);
        }
        Ok(self.matches.get(term).cloned())
    }
}

/// Mock synonym source for tests.
#[derive(Default)]
pub struct MockSynonyms {
    synonyms: HashMap<String, Vec<String>>,
}

impl MockSynonyms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_synonyms(mut self, identifier: impl Into<String>, synonyms: &[&str]) -> Self {
        self.synonyms.insert(
            identifier.into(),
            synonyms.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl SynonymSource for MockSynonyms {
    async fn synonyms(&self, identifier: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self.synonyms.get(identifier).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonym_string_joins_with_pipes() {
        let m = RegistryMatch::new("56-81-5", vec!["Glycerin".into(), "Glycerol".into()]);
        assert_eq!(m.synonym_string(), "Glycerin|Glycerol");

        let empty = RegistryMatch::new("56-81-5", Vec::new());
        assert_eq!(empty.synonym_string(), "N/A");
    }

    #[tokio::test]
    async fn mock_registry_returns_scripted_match() {
        let registry = MockRegistry::new().with_match("GLYCERINE", "56-81-5", &["Glycerin"]);

        let hit = registry.search_and_detail("GLYCERINE").await.unwrap();
        assert_eq!(hit.unwrap().identifier, "56-81-5");

        let miss = registry.search_and_detail("UNKNOWN").await.unwrap();
        assert!(miss.is_none());

        assert_eq!(registry.calls(), vec!["GLYCERINE", "UNKNOWN"]);
    }

    #[tokio::test]
    async fn mock_registry_short_terms_miss() {
        let registry = MockRegistry::new().with_match("AB", "1-2-3", &[]);
        let miss = registry.search_and_detail("AB").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn mock_registry_scripted_failure() {
        let registry = MockRegistry::new().with_failure("FLAKY");
        let err = registry.search_and_detail("FLAKY").await.unwrap_err();
        assert!(matches!(err, RegistryError::Network(_)));
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(200); // short interval for the test

        let start = Instant::now();
        limiter.wait().await;
        let first = start.elapsed();
        limiter.wait().await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(100));
        assert!(second >= Duration::from_millis(180));
    }
}
