//! Label synthesis boundary.
//!
//! How a label is phrased belongs to an external text-generation
//! collaborator; the engine only guarantees the shape of the request, the
//! sibling-differentiation context, and that a failed call degrades to a
//! deterministic fallback instead of an empty label.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;

use crate::snapshot::TopicId;

/// Documents in the fallback label.
const FALLBACK_DOCUMENTS: usize = 2;

/// Separator used when concatenating documents into a fallback label.
const FALLBACK_SEPARATOR: &str = " | ";

/// Structured input for one label call. The same shape is supplied for
/// every node, leaf or synthetic.
#[derive(Debug, Clone)]
pub struct LabelRequest {
    pub node_id: TopicId,
    /// Representative sample documents, most representative first.
    pub documents: Vec<String>,
    /// Top aggregated keywords, highest mass first.
    pub keywords: Vec<String>,
    pub depth: u32,
    pub max_depth: u32,
    /// Labels already produced for siblings under the same parent, so the
    /// service can avoid duplicate or near-duplicate names.
    pub sibling_labels: Vec<String>,
}

/// Failure from a label call, split by whether a retry could help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// Rate limit, overload, timeout: worth retrying with backoff.
    #[error("transient label service failure: {0}")]
    Transient(String),
    /// Bad request, auth, unusable response: retrying will not help.
    #[error("permanent label service failure: {0}")]
    Permanent(String),
}

/// Narrow interface to the external labeling capability. Must be
/// idempotent-safe to retry.
#[async_trait]
pub trait LabelSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &LabelRequest) -> Result<String, LabelError>;
}

/// Bounded retry with exponential backoff and jitter for transient label
/// failures. Injected into the adapter so tests can substitute a
/// zero-delay schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each delay by up to +/-25% to avoid thundering herds.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting. Useful in tests.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff before retry number `attempt` (1-based over completed
    /// attempts): base * 2^(attempt-1), capped, optionally jittered.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        if !self.jitter || raw.is_zero() {
            return raw;
        }
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        raw.mul_f64(factor)
    }
}

/// Drive one label call through the retry policy. Transient failures back
/// off and retry up to the attempt budget; permanent failures return
/// immediately.
pub async fn synthesize_with_retry<S: LabelSynthesizer + ?Sized>(
    synthesizer: &S,
    request: &LabelRequest,
    policy: &RetryPolicy,
) -> Result<String, LabelError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = LabelError::Transient("no attempts made".to_string());

    for attempt in 1..=attempts {
        match synthesizer.synthesize(request).await {
            Ok(label) => return Ok(label),
            Err(e @ LabelError::Permanent(_)) => return Err(e),
            Err(e @ LabelError::Transient(_)) => {
                last_error = e;
                if attempt < attempts {
                    sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(last_error)
}

/// Deterministic fallback label: the first few representative documents
/// joined by a separator, or a positional name when no documents exist.
/// Never empty.
pub fn fallback_label(node_id: TopicId, documents: &[String]) -> String {
    let parts: Vec<&str> = documents
        .iter()
        .take(FALLBACK_DOCUMENTS)
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();

    if parts.is_empty() {
        format!("Topic {}", node_id)
    } else {
        parts.join(FALLBACK_SEPARATOR)
    }
}
