//! LLM assistant: optional identity-resolution collaborator
//!
//! The assistant supplies cleaned-term suggestions, direct knowledge-base
//! answers, parameter extraction and document verification. It is strictly
//! best-effort: every operation fails soft (None / false) so an absent or
//! misbehaving model can never abort a resolution row. Availability is
//! decided once at construction via [`LlmCapability`]; call sites branch on
//! that, never on ad-hoc probing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout for completion calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Document text sent for verification is capped to keep prompts bounded.
const VERIFY_TEXT_CAP: usize = 10_000;
/// The sentinel the model is instructed to emit when not confident.
const MODEL_NOT_FOUND: &str = "NOT FOUND";

/// A direct knowledge-base answer about a material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownIdentity {
    /// Registry number, when the model is confident.
    pub identifier: Option<String>,
    /// Standardized descriptive name, when the model is confident.
    pub descriptive_name: Option<String>,
}

/// The four operations the resolution pipeline consumes.
///
/// Implementations must fail soft: network errors, refusals and malformed
/// completions all surface as `None` / `false`, never as panics or errors.
#[async_trait]
pub trait LlmAssistant: Send + Sync {
    /// Single best-guess cleaned chemical name for a raw description.
    async fn clean_term(&self, text: &str) -> Option<String>;

    /// Direct identifier + descriptive-name answer from model knowledge.
    async fn known_identity(&self, text: &str) -> Option<KnownIdentity>;

    /// Extract named parameters (plus the identifier field) from free text.
    ///
    /// Values the model reports as absent are omitted from the map.
    async fn extract_parameters(
        &self,
        text: &str,
        identifier_name: &str,
        parameter_names: &[String],
    ) -> Option<BTreeMap<String, String>>;

    /// Whether the document text confirms the given identifier.
    async fn verify_identifier(&self, text: &str, identifier: &str) -> bool;
}

/// Availability of the assistant, fixed at construction.
#[derive(Clone)]
pub enum LlmCapability {
    Available(Arc<dyn LlmAssistant>),
    Unavailable,
}

impl LlmCapability {
    pub fn available(assistant: Arc<dyn LlmAssistant>) -> Self {
        Self::Available(assistant)
    }

    pub fn unavailable() -> Self {
        Self::Unavailable
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// The assistant, if one was configured.
    pub fn get(&self) -> Option<&Arc<dyn LlmAssistant>> {
        match self {
            Self::Available(assistant) => Some(assistant),
            Self::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for LlmCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => write!(f, "LlmCapability::Available"),
            Self::Unavailable => write!(f, "LlmCapability::Unavailable"),
        }
    }
}

/// Extract the first brace-delimited JSON object from a completion.
///
/// Models wrap JSON in prose or markdown fences often enough that strict
/// parsing of the whole completion is a losing game.
pub(crate) fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

// ---------------------------------------------------------------------------
// HTTP completion client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    generation: String,
}

/// Assistant backed by an HTTP JSON-completion endpoint.
///
/// Speaks the invoke-model contract: POST `{prompt, max_gen_len,
/// temperature, top_p}`, read `{generation}`.
pub struct HttpAssistant {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAssistant {
    pub fn new(endpoint: impl Into<String>) -> Option<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .ok()?;
        Some(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn complete(&self, prompt: String, max_tokens: u32, temperature: f32) -> Option<String> {
        let body = json!({
            "prompt": prompt,
            "max_gen_len": max_tokens,
            "temperature": temperature,
            "top_p": if temperature == 0.0 { 1.0 } else { 0.9 },
        });

        let response = match self.http.post(&self.endpoint).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "assistant request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "assistant returned an error");
            return None;
        }
        match response.json::<CompletionResponse>().await {
            Ok(parsed) => Some(parsed.generation.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "assistant response parse failed");
                None
            }
        }
    }
}

#[async_trait]
impl LlmAssistant for HttpAssistant {
    async fn clean_term(&self, text: &str) -> Option<String> {
        if text.trim().len() < 3 {
            return None;
        }
        let prompt = format!(
            "You are an expert chemical taxonomist. Extract the pure, standard \
             chemical name from a raw product description.\n\
             1. Remove trade names.\n\
             2. Remove grades (USP, EP, JP, Technical).\n\
             3. Remove physical forms (Powder, Liquid, Beads, Granular).\n\
             4. Remove packaging info (Drum, Bulk, Bag).\n\
             5. Simplify derivatives when the parent is the primary active.\n\
             6. Return ONLY the cleaned chemical name. No markdown, no explanations.\n\
             Raw description: \"{text}\"\n\
             Cleaned name:"
        );
        let answer = self.complete(prompt, 50, 0.1).await?;
        let cleaned = answer.trim().trim_matches('"').to_string();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    async fn known_identity(&self, text: &str) -> Option<KnownIdentity> {
        if text.trim().len() < 3 {
            return None;
        }
        let prompt = format!(
            "You are an expert chemical taxonomist. Identify the substance and \
             provide its CAS Registry Number and INCI name.\n\
             1. Be precise: if the input is a trade name, identify the chemical.\n\
             2. Return a JSON object with keys \"cas\" and \"inci\".\n\
             3. Use \"{MODEL_NOT_FOUND}\" if you are not confident.\n\
             Input: \"{text}\""
        );
        let answer = self.complete(prompt, 128, 0.1).await?;
        let value = extract_json_object(&answer)?;

        let field = |key: &str| -> Option<String> {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != MODEL_NOT_FOUND)
                .map(str::to_string)
        };

        Some(KnownIdentity {
            identifier: field("cas"),
            descriptive_name: field("inci"),
        })
    }

    async fn extract_parameters(
        &self,
        text: &str,
        identifier_name: &str,
        parameter_names: &[String],
    ) -> Option<BTreeMap<String, String>> {
        if text.trim().is_empty() || parameter_names.is_empty() {
            return None;
        }
        let wanted = parameter_names.join(", ");
        let prompt = format!(
            "You are an expert chemical data extractor. Extract the following \
             parameters from the description: {wanted}.\n\
             Rules:\n\
             1. Return a JSON object whose keys are the parameter names requested.\n\
             2. If a parameter value is not present in the text, use \"N/A\".\n\
             3. Do not invent values.\n\
             4. Also extract the value for \"{identifier_name}\" if present.\n\
             Description: \"{text}\""
        );
        let answer = self.complete(prompt, 200, 0.0).await?;
        let value = extract_json_object(&answer)?;
        let object = value.as_object()?;

        let mut extracted = BTreeMap::new();
        for key in parameter_names.iter().map(String::as_str).chain([identifier_name]) {
            if let Some(v) = object.get(key).and_then(|v| v.as_str()) {
                let v = v.trim();
                if !v.is_empty() && v != "N/A" {
                    extracted.insert(key.to_string(), v.to_string());
                }
            }
        }
        if extracted.is_empty() {
            None
        } else {
            Some(extracted)
        }
    }

    async fn verify_identifier(&self, text: &str, identifier: &str) -> bool {
        if text.trim().is_empty() || identifier.trim().is_empty() {
            return false;
        }
        let excerpt: String = text.chars().take(VERIFY_TEXT_CAP).collect();
        let prompt = format!(
            "You are an expert chemical safety data analyst. VERIFY whether the \
             document text confirms that the product contains the identifier \
             {identifier}.\n\
             1. Look for CAS #, CAS No, or Chemical Abstract Service Registry Number.\n\
             2. If {identifier} is explicitly listed as an ingredient, return true.\n\
             3. If a different identifier is listed for the main ingredient, return false.\n\
             4. If the identifier is not mentioned at all, return false.\n\
             5. Return ONLY a JSON object: {{\"verified\": true}} or {{\"verified\": false}}.\n\
             Document text: \"{excerpt}\"\n\
             Target identifier: \"{identifier}\""
        );
        match self.complete(prompt, 50, 0.0).await {
            Some(answer) => answer.to_lowercase().contains("true"),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Scripted assistant for tests.
#[derive(Default)]
pub struct MockAssistant {
    clean_terms: HashMap<String, String>,
    identities: HashMap<String, KnownIdentity>,
    parameters: HashMap<String, BTreeMap<String, String>>,
    verify_result: bool,
}

impl MockAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleaned-term answer for an exact input.
    pub fn with_clean_term(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.clean_terms.insert(input.into(), output.into());
        self
    }

    /// Register a knowledge-base answer for an exact input.
    pub fn with_identity(
        mut self,
        input: impl Into<String>,
        identifier: Option<&str>,
        descriptive_name: Option<&str>,
    ) -> Self {
        self.identities.insert(
            input.into(),
            KnownIdentity {
                identifier: identifier.map(str::to_string),
                descriptive_name: descriptive_name.map(str::to_string),
            },
        );
        self
    }

    /// Register extracted parameters for an exact input text.
    pub fn with_parameters(mut self, input: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        self.parameters.insert(
            input.into(),
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Make every verification call succeed (or fail).
    pub fn verifying(mut self, result: bool) -> Self {
        self.verify_result = result;
        self
    }

    /// Wrap into an available capability.
    pub fn into_capability(self) -> LlmCapability {
        LlmCapability::available(Arc::new(self))
    }
}

#[async_trait]
impl LlmAssistant for MockAssistant {
    async fn clean_term(&self, text: &str) -> Option<String> {
        self.clean_terms.get(text).cloned()
    }

    async fn known_identity(&self, text: &str) -> Option<KnownIdentity> {
        self.identities.get(text).cloned()
    }

    async fn extract_parameters(
        &self,
        text: &str,
        _identifier_name: &str,
        _parameter_names: &[String],
    ) -> Option<BTreeMap<String, String>> {
        self.parameters.get(text).cloned()
    }

    async fn verify_identifier(&self, _text: &str, _identifier: &str) -> bool {
        self.verify_result
    }
}
