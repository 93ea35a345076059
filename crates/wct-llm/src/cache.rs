//! Run-scoped LLM response cache entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delivery state of a cached response slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Completed,
    Pending,
    Failed,
}

/// One cached LLM exchange.
///
/// Sync providers write `completed` entries directly; batch providers write
/// `pending` entries carrying the submission's batch id, upgraded by the
/// poller once results arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub model_name: String,
    pub response_model_name: String,
}

impl CacheEntry {
    /// Deterministic cache key over the inputs that shape a response.
    ///
    /// Equal `(prompt, model, response_model_name)` always digests to the
    /// same key, across processes and providers.
    #[must_use]
    pub fn compute_key(prompt: &str, model: &str, response_model_name: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prompt.as_bytes());
        hasher.update(b"\x00");
        hasher.update(model.as_bytes());
        hasher.update(b"\x00");
        hasher.update(response_model_name.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    #[must_use]
    pub fn completed(response: Value, model_name: &str, response_model_name: &str) -> Self {
        Self {
            status: CacheStatus::Completed,
            response: Some(response),
            batch_id: None,
            model_name: model_name.to_string(),
            response_model_name: response_model_name.to_string(),
        }
    }

    #[must_use]
    pub fn pending(batch_id: &str, model_name: &str, response_model_name: &str) -> Self {
        Self {
            status: CacheStatus::Pending,
            response: None,
            batch_id: Some(batch_id.to_string()),
            model_name: model_name.to_string(),
            response_model_name: response_model_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_is_deterministic() {
        let a = CacheEntry::compute_key("prompt", "model-a", "Response");
        let b = CacheEntry::compute_key("prompt", "model-a", "Response");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_varies_with_each_input() {
        let base = CacheEntry::compute_key("prompt", "model-a", "Response");

        assert_ne!(base, CacheEntry::compute_key("prompt2", "model-a", "Response"));
        assert_ne!(base, CacheEntry::compute_key("prompt", "model-b", "Response"));
        assert_ne!(base, CacheEntry::compute_key("prompt", "model-a", "Other"));
    }

    #[test]
    fn cache_key_separates_field_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc".
        let a = CacheEntry::compute_key("ab", "c", "R");
        let b = CacheEntry::compute_key("a", "bc", "R");
        assert_ne!(a, b);
    }

    #[test]
    fn entry_round_trips_through_json() {
        let entry = CacheEntry::completed(json!({"ok": true}), "model", "Response");
        let value = serde_json::to_value(&entry).unwrap();
        let restored: CacheEntry = serde_json::from_value(value).unwrap();
        assert_eq!(restored, entry);
    }

    #[test]
    fn pending_entry_carries_batch_id() {
        let entry = CacheEntry::pending("batch-7", "model", "Response");
        assert_eq!(entry.status, CacheStatus::Pending);
        assert_eq!(entry.batch_id.as_deref(), Some("batch-7"));
        assert!(entry.response.is_none());
    }
}
