//! Requests and per-call validation context

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::{PipelineError, Result};

/// Scalar metadata value attached to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Conversation and retrieval material a request refers to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Prior conversation turns, oldest first
    #[serde(default)]
    pub history: Vec<String>,

    /// Retrieved documents the payload should be grounded in
    #[serde(default)]
    pub documents: Vec<String>,

    /// The question that produced the payload, if the payload is an answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a prior conversation turn
    pub fn with_turn<S: Into<String>>(mut self, turn: S) -> Self {
        self.history.push(turn.into());
        self
    }

    /// Add a retrieved document
    pub fn with_document<S: Into<String>>(mut self, document: S) -> Self {
        self.documents.push(document.into());
        self
    }

    /// Set the originating query
    pub fn with_query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// One inbound piece of content to validate
///
/// Built once per call and handed to the engine by value; validators only
/// ever see it behind a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request identifier, used in logs and on the decision
    pub id: String,

    /// User- or model-supplied content
    pub text: String,

    /// Caller id, timestamp, channel and similar scalars
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,

    /// Optional conversation/retrieval context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
}

impl Request {
    /// Create a request with a generated id
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            metadata: BTreeMap::new(),
            context: None,
        }
    }

    /// Use a caller-supplied id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach conversation/retrieval context
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Retrieved documents, empty when no context was given
    pub fn documents(&self) -> &[String] {
        self.context
            .as_ref()
            .map(|c| c.documents.as_slice())
            .unwrap_or(&[])
    }

    /// Originating query, if any
    pub fn query(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.query.as_deref())
    }

    /// Check the request contract
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PipelineError::invalid_request("request id is empty"));
        }

        for (key, value) in &self.metadata {
            if key.trim().is_empty() {
                return Err(PipelineError::invalid_request("metadata key is empty"));
            }
            if let MetadataValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(PipelineError::invalid_request(format!(
                        "metadata value for '{}' is not finite",
                        key
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Per-call context carried to every validator
///
/// `payload` is the text the validator must judge. It starts as the request
/// text and picks up repairs from validators earlier in the chain.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Id of the request being validated
    pub request_id: String,
    /// Current running payload
    pub payload: String,
    /// Point after which pending validator results are discarded
    pub deadline: Option<Instant>,
    /// When the run started
    pub started_at: Instant,
}

impl ValidationContext {
    /// Create the context for a fresh run over `request`
    pub fn new(request: &Request) -> Self {
        Self {
            request_id: request.id.clone(),
            payload: request.text.clone(),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Set a deadline relative to the start of the run
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = self.started_at.checked_add(timeout);
        self
    }

    /// Copy of this context judging a different payload
    pub fn with_payload<S: Into<String>>(&self, payload: S) -> Self {
        Self {
            payload: payload.into(),
            ..self.clone()
        }
    }

    /// Time left before the deadline; `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Check whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}
