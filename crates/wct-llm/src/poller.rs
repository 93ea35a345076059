//! Polls batch providers and advances cache entries for paused runs.
//!
//! Bridges the gap between batch submission (the service returns a pending
//! outcome) and resume (the executor expects cache entries to be
//! completed). Polling is idempotent: once every job is terminal, another
//! poll finds no active jobs and changes nothing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use wct_store::ArtifactStore;

use crate::batch::{BatchJob, BatchState};
use crate::cache::{CacheEntry, CacheStatus};
use crate::error::LlmError;
use crate::provider::LlmProvider;

/// Summary of one `poll_run` invocation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollResult {
    /// Batches that reached completion in this poll.
    pub completed: usize,
    /// Batches that reached a failed terminal state in this poll.
    pub failed: usize,
    /// Batches still in progress.
    pub pending: usize,
    /// Non-fatal problems (e.g. provider mismatch), one message each.
    pub errors: Vec<String>,
}

/// Polls batch API providers and updates cache entries and batch jobs.
pub struct BatchResultPoller {
    store: Arc<dyn ArtifactStore>,
    provider: Arc<dyn LlmProvider>,
}

impl BatchResultPoller {
    pub fn new(store: Arc<dyn ArtifactStore>, provider: Arc<dyn LlmProvider>) -> Self {
        Self { store, provider }
    }

    /// Poll every active batch job of a run.
    pub async fn poll_run(&self, run_id: &str) -> Result<PollResult, LlmError> {
        let jobs = BatchJob::list_for_run(self.store.as_ref(), run_id).await?;
        let mut result = PollResult::default();

        for mut job in jobs.into_iter().filter(|j| j.status.is_active()) {
            if job.provider != self.provider.provider_name()
                || job.model != self.provider.model_name()
            {
                result.errors.push(format!(
                    "Batch {}: provider/model mismatch - job has {}/{}, poller has {}/{}",
                    job.batch_id,
                    job.provider,
                    job.model,
                    self.provider.provider_name(),
                    self.provider.model_name(),
                ));
                continue;
            }

            let Some(batch_provider) = self.provider.as_batch() else {
                result.errors.push(format!(
                    "Batch {}: provider '{}' has no batch support",
                    job.batch_id,
                    self.provider.provider_name()
                ));
                continue;
            };

            let status = batch_provider.get_batch_status(&job.batch_id).await?;

            match status.state {
                BatchState::Completed => {
                    self.handle_completed(run_id, &mut job, &mut result).await?;
                }
                BatchState::Failed | BatchState::Cancelled | BatchState::Expired => {
                    self.handle_failed(run_id, &mut job, status.state, &mut result)
                        .await?;
                }
                state => {
                    if job.status != state {
                        job.status = state;
                        job.save(self.store.as_ref(), run_id).await?;
                    }
                    result.pending += 1;
                }
            }
        }

        Ok(result)
    }

    /// Fetch a completed batch's results and upgrade its cache entries.
    async fn handle_completed(
        &self,
        run_id: &str,
        job: &mut BatchJob,
        result: &mut PollResult,
    ) -> Result<(), LlmError> {
        let batch_provider = self.provider.as_batch().ok_or_else(|| {
            LlmError::BatchUnsupported {
                provider: self.provider.provider_name().to_string(),
            }
        })?;
        let batch_results = batch_provider.get_batch_results(&job.batch_id).await?;

        let by_id: std::collections::HashMap<&str, &crate::batch::BatchResult> = batch_results
            .iter()
            .map(|r| (r.custom_id.as_str(), r))
            .collect();

        for cache_key in &job.cache_keys {
            let Some(batch_result) = by_id.get(cache_key.as_str()) else {
                warn!(
                    batch_id = %job.batch_id,
                    cache_key = %cache_key,
                    "Batch result missing for cache key"
                );
                continue;
            };

            let Some(cached) = self.store.cache_get(run_id, cache_key).await? else {
                continue;
            };
            let Ok(mut entry) = serde_json::from_value::<CacheEntry>(cached) else {
                continue;
            };

            if batch_result.succeeded {
                entry.status = CacheStatus::Completed;
                entry.response = batch_result.response.clone();
            } else {
                entry.status = CacheStatus::Failed;
                entry.response = None;
            }
            self.store
                .cache_set(run_id, cache_key, &serde_json::to_value(&entry)?)
                .await?;
        }

        job.status = BatchState::Completed;
        job.completed_at = Some(Utc::now());
        job.save(self.store.as_ref(), run_id).await?;
        result.completed += 1;

        info!(run_id = %run_id, batch_id = %job.batch_id, "Batch completed");
        Ok(())
    }

    /// Mark every cache entry of a failed batch as failed.
    async fn handle_failed(
        &self,
        run_id: &str,
        job: &mut BatchJob,
        state: BatchState,
        result: &mut PollResult,
    ) -> Result<(), LlmError> {
        for cache_key in &job.cache_keys {
            let Some(cached) = self.store.cache_get(run_id, cache_key).await? else {
                continue;
            };
            let Ok(mut entry) = serde_json::from_value::<CacheEntry>(cached) else {
                continue;
            };
            entry.status = CacheStatus::Failed;
            entry.response = None;
            self.store
                .cache_set(run_id, cache_key, &serde_json::to_value(&entry)?)
                .await?;
        }

        job.status = state;
        job.completed_at = Some(Utc::now());
        job.save(self.store.as_ref(), run_id).await?;
        result.failed += 1;

        warn!(run_id = %run_id, batch_id = %job.batch_id, state = %state, "Batch failed");
        Ok(())
    }
}
