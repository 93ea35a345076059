//! The LLM service: batching, caching, and provider dispatch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use wct_store::ArtifactStore;

use crate::batch::{BatchJob, BatchRequest};
use crate::cache::{CacheEntry, CacheStatus};
use crate::error::LlmError;
use crate::planner::BatchPlanner;
use crate::provider::{LlmProvider, ResponseFormat};
use crate::tokens::max_payload_tokens;
use crate::types::{BatchingMode, ItemGroup, LlmCompletionResult, PromptBuilder};

/// Default maximum items per batch in count-based mode.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of a service call.
///
/// `Pending` replaces exception-style control flow: a batch-capable
/// provider accepted the prompts, cache entries were written as pending,
/// and the caller must pause until the jobs are polled to completion.
#[derive(Debug)]
pub enum CompletionOutcome<T, R> {
    Ready(LlmCompletionResult<T, R>),
    Pending(Vec<BatchJob>),
}

/// Orchestrates batching, caching, and provider calls.
///
/// Processors decide what to group; the service decides how to batch.
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn ArtifactStore>,
    batch_size: usize,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            provider,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Process groups of findings into structured responses.
    ///
    /// Per planned batch: build the prompt, check the cache, and either
    /// reuse the cached response or call the provider. On a batch-capable
    /// provider, all cache misses across the call are accumulated into a
    /// single submission; pending cache entries and one [`BatchJob`] are
    /// persisted before `Pending` is returned.
    pub async fn complete<T>(
        &self,
        groups: Vec<ItemGroup<T>>,
        builder: &dyn PromptBuilder<T>,
        format: &ResponseFormat,
        mode: BatchingMode,
        run_id: &str,
    ) -> Result<CompletionOutcome<T, Value>, LlmError>
    where
        T: Clone + Send + Sync,
    {
        let model = self.provider.model_name().to_string();
        let planner = BatchPlanner::new(
            max_payload_tokens(self.provider.context_window()),
            self.batch_size,
        );
        let plan = planner.plan(groups, mode);

        debug!(
            run_id = %run_id,
            batches = plan.batches.len(),
            skipped = plan.skipped.len(),
            model = %model,
            "Planned LLM batches"
        );

        let mut responses: Vec<Value> = Vec::new();
        let mut miss_requests: Vec<BatchRequest> = Vec::new();

        for batch in &plan.batches {
            let items: Vec<T> = batch.items().cloned().collect();
            let prompt = builder.build_prompt(&items, batch.content());
            let cache_key = CacheEntry::compute_key(&prompt, &model, &format.name);

            if let Some(cached) = self.store.cache_get(run_id, &cache_key).await?
                && let Ok(entry) = serde_json::from_value::<CacheEntry>(cached)
                && entry.status == CacheStatus::Completed
                && let Some(response) = entry.response
            {
                debug!(run_id = %run_id, cache_key = %cache_key, "LLM cache hit");
                responses.push(response);
                continue;
            }

            if self.provider.as_batch().is_some() {
                miss_requests.push(BatchRequest {
                    custom_id: cache_key,
                    prompt,
                    model: model.clone(),
                    response_schema: format.schema.clone(),
                });
                continue;
            }

            let response = self.provider.invoke_structured(&prompt, format).await?;
            let entry = CacheEntry::completed(response.clone(), &model, &format.name);
            self.store
                .cache_set(run_id, &cache_key, &serde_json::to_value(&entry)?)
                .await?;
            responses.push(response);
        }

        if !miss_requests.is_empty() {
            // Only reachable when as_batch() returned Some above.
            let batch_provider =
                self.provider
                    .as_batch()
                    .ok_or_else(|| LlmError::BatchUnsupported {
                        provider: self.provider.provider_name().to_string(),
                    })?;

            let cache_keys: Vec<String> =
                miss_requests.iter().map(|r| r.custom_id.clone()).collect();
            let submission = batch_provider.submit_batch(&miss_requests).await?;

            info!(
                run_id = %run_id,
                batch_id = %submission.batch_id,
                requests = submission.request_count,
                "Submitted LLM batch"
            );

            for key in &cache_keys {
                let entry = CacheEntry::pending(&submission.batch_id, &model, &format.name);
                self.store
                    .cache_set(run_id, key, &serde_json::to_value(&entry)?)
                    .await?;
            }

            let job = BatchJob::new(
                &submission.batch_id,
                self.provider.provider_name(),
                &model,
                cache_keys,
            );
            job.save(self.store.as_ref(), run_id).await?;

            return Ok(CompletionOutcome::Pending(vec![job]));
        }

        Ok(CompletionOutcome::Ready(LlmCompletionResult {
            responses,
            skipped: plan.skipped,
        }))
    }

    /// As [`complete`](Self::complete), decoding each response into `R`.
    pub async fn complete_typed<T, R>(
        &self,
        groups: Vec<ItemGroup<T>>,
        builder: &dyn PromptBuilder<T>,
        mode: BatchingMode,
        run_id: &str,
    ) -> Result<CompletionOutcome<T, R>, LlmError>
    where
        T: Clone + Send + Sync,
        R: DeserializeOwned + schemars::JsonSchema,
    {
        let format = ResponseFormat::for_type::<R>();
        match self.complete(groups, builder, &format, mode, run_id).await? {
            CompletionOutcome::Ready(result) => {
                let typed = result
                    .map_responses(serde_json::from_value)
                    .map_err(|e| LlmError::ResponseParse(e.to_string()))?;
                Ok(CompletionOutcome::Ready(typed))
            }
            CompletionOutcome::Pending(jobs) => Ok(CompletionOutcome::Pending(jobs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use serde_json::json;
    use wct_store::InMemoryStore;

    struct JoinBuilder;

    impl PromptBuilder<String> for JoinBuilder {
        fn build_prompt(&self, items: &[String], content: Option<&str>) -> String {
            match content {
                Some(content) => format!("{}\n---\n{}", content, items.join(",")),
                None => items.join(","),
            }
        }
    }

    fn groups(items: &[&str]) -> Vec<ItemGroup<String>> {
        vec![ItemGroup::new(
            items.iter().map(|s| s.to_string()).collect(),
        )]
    }

    fn format() -> ResponseFormat {
        ResponseFormat::new("TestResponse", json!({"type": "object"}))
    }

    #[tokio::test]
    async fn sync_provider_returns_one_response_per_batch() {
        let provider = Arc::new(MockProvider::sync("test-model"));
        provider.push_response(json!({"batch": 1}));
        provider.push_response(json!({"batch": 2}));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), store).with_batch_size(2);

        let outcome = service
            .complete(
                groups(&["a", "b", "c"]),
                &JoinBuilder,
                &format(),
                BatchingMode::CountBased,
                "run-1",
            )
            .await
            .unwrap();

        let CompletionOutcome::Ready(result) = outcome else {
            panic!("expected ready outcome");
        };
        assert_eq!(result.responses, vec![json!({"batch": 1}), json!({"batch": 2})]);
        assert_eq!(provider.prompts(), vec!["a,b", "c"]);
    }

    #[tokio::test]
    async fn responses_are_cached_and_reused() {
        let provider = Arc::new(MockProvider::sync("test-model"));
        provider.push_response(json!({"n": 1}));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), Arc::clone(&store) as _);

        let first = service
            .complete(groups(&["a"]), &JoinBuilder, &format(), BatchingMode::CountBased, "run-1")
            .await
            .unwrap();
        let CompletionOutcome::Ready(first) = first else {
            panic!("expected ready");
        };

        // Second call hits the cache: no scripted response left, still works.
        let second = service
            .complete(groups(&["a"]), &JoinBuilder, &format(), BatchingMode::CountBased, "run-1")
            .await
            .unwrap();
        let CompletionOutcome::Ready(second) = second else {
            panic!("expected ready");
        };

        assert_eq!(first.responses, second.responses);
        assert_eq!(provider.prompts().len(), 1, "provider called once");
    }

    #[tokio::test]
    async fn batch_provider_submits_misses_and_returns_pending() {
        let provider = Arc::new(MockProvider::batching("test-model"));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), Arc::clone(&store) as _).with_batch_size(1);

        let outcome = service
            .complete(
                groups(&["a", "b"]),
                &JoinBuilder,
                &format(),
                BatchingMode::CountBased,
                "run-1",
            )
            .await
            .unwrap();

        let CompletionOutcome::Pending(jobs) = outcome else {
            panic!("expected pending outcome");
        };
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].cache_keys.len(), 2, "one request per planned batch");
        assert_eq!(jobs[0].provider, "mock");

        // Pending entries and the job are persisted.
        let stored = BatchJob::list_for_run(store.as_ref(), "run-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        for key in &jobs[0].cache_keys {
            let entry: CacheEntry =
                serde_json::from_value(store.cache_get("run-1", key).await.unwrap().unwrap())
                    .unwrap();
            assert_eq!(entry.status, CacheStatus::Pending);
            assert_eq!(entry.batch_id.as_deref(), Some(jobs[0].batch_id.as_str()));
        }
    }

    #[tokio::test]
    async fn batch_provider_with_full_cache_is_ready_without_submission() {
        let provider = Arc::new(MockProvider::batching("test-model"));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), Arc::clone(&store) as _);

        // Pre-populate the cache with a completed entry for the prompt.
        let prompt = "a";
        let key = CacheEntry::compute_key(prompt, "test-model", "TestResponse");
        let entry = CacheEntry::completed(json!({"cached": true}), "test-model", "TestResponse");
        store
            .cache_set("run-1", &key, &serde_json::to_value(&entry).unwrap())
            .await
            .unwrap();

        let outcome = service
            .complete(groups(&["a"]), &JoinBuilder, &format(), BatchingMode::CountBased, "run-1")
            .await
            .unwrap();

        let CompletionOutcome::Ready(result) = outcome else {
            panic!("expected ready outcome after cache hit");
        };
        assert_eq!(result.responses, vec![json!({"cached": true})]);
        assert!(provider.submitted_batches().is_empty());
    }

    #[tokio::test]
    async fn empty_groups_complete_immediately() {
        let provider = Arc::new(MockProvider::sync("test-model"));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), store);

        let outcome = service
            .complete(
                Vec::<ItemGroup<String>>::new(),
                &JoinBuilder,
                &format(),
                BatchingMode::CountBased,
                "run-1",
            )
            .await
            .unwrap();

        let CompletionOutcome::Ready(result) = outcome else {
            panic!("expected ready");
        };
        assert!(result.responses.is_empty());
        assert!(result.skipped.is_empty());
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn extended_context_skips_flow_through_to_result() {
        let provider = Arc::new(MockProvider::sync("test-model"));
        let store = Arc::new(InMemoryStore::new());
        let service = LlmService::new(provider.clone(), store);

        let outcome = service
            .complete(
                vec![ItemGroup::new(vec!["orphan".to_string()])],
                &JoinBuilder,
                &format(),
                BatchingMode::ExtendedContext,
                "run-1",
            )
            .await
            .unwrap();

        let CompletionOutcome::Ready(result) = outcome else {
            panic!("expected ready");
        };
        assert!(result.responses.is_empty());
        assert_eq!(result.skipped.len(), 1);
    }
}
