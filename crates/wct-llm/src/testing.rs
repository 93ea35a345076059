//! Test doubles for the provider traits.
//!
//! Not part of the public API stability guarantees; exported for use by
//! this crate's tests and by integration tests higher in the workspace.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::batch::{BatchRequest, BatchResult, BatchState, BatchStatus, BatchSubmission};
use crate::error::LlmError;
use crate::provider::{BatchLlmProvider, LlmProvider, ResponseFormat};

struct MockBatch {
    requests: Vec<BatchRequest>,
    state: BatchState,
    results: Vec<BatchResult>,
}

/// Scriptable in-memory provider.
///
/// In sync mode, responses are served from a queue (falling back to a
/// responder closure). In batching mode, submissions are held until the
/// test completes or fails them, mirroring a provider's asynchronous batch
/// lifecycle.
pub struct MockProvider {
    model: String,
    context_window: usize,
    batching: bool,
    responses: Mutex<VecDeque<Value>>,
    responder: Box<dyn Fn(&str) -> Value + Send + Sync>,
    prompts: Mutex<Vec<String>>,
    batches: Mutex<HashMap<String, MockBatch>>,
    batch_counter: AtomicUsize,
}

impl MockProvider {
    /// A provider with only the synchronous path.
    #[must_use]
    pub fn sync(model: &str) -> Self {
        Self::build(model, false)
    }

    /// A provider that accepts batch submissions.
    #[must_use]
    pub fn batching(model: &str) -> Self {
        Self::build(model, true)
    }

    fn build(model: &str, batching: bool) -> Self {
        Self {
            model: model.to_string(),
            context_window: 200_000,
            batching,
            responses: Mutex::new(VecDeque::new()),
            responder: Box::new(|_| json!({})),
            prompts: Mutex::new(Vec::new()),
            batches: Mutex::new(HashMap::new()),
            batch_counter: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    /// Compute responses from the prompt when the scripted queue is empty.
    #[must_use]
    pub fn with_responder(
        mut self,
        responder: impl Fn(&str) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    /// Queue the next synchronous response.
    pub fn push_response(&self, response: Value) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Prompts seen by the synchronous path, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Ids of every batch submitted so far.
    #[must_use]
    pub fn submitted_batches(&self) -> Vec<String> {
        self.batches.lock().unwrap().keys().cloned().collect()
    }

    /// Requests held by a submitted batch.
    #[must_use]
    pub fn batch_requests(&self, batch_id: &str) -> Vec<BatchRequest> {
        self.batches
            .lock()
            .unwrap()
            .get(batch_id)
            .map(|b| b.requests.clone())
            .unwrap_or_default()
    }

    /// Complete a batch, deriving each result from its request.
    pub fn finish_batch_with(&self, batch_id: &str, f: impl Fn(&BatchRequest) -> Value) {
        let mut batches = self.batches.lock().unwrap();
        if let Some(batch) = batches.get_mut(batch_id) {
            batch.results = batch
                .requests
                .iter()
                .map(|request| BatchResult {
                    custom_id: request.custom_id.clone(),
                    succeeded: true,
                    response: Some(f(request)),
                })
                .collect();
            batch.state = BatchState::Completed;
        }
    }

    /// Transition a batch to a failed terminal state.
    pub fn fail_batch(&self, batch_id: &str, state: BatchState) {
        let mut batches = self.batches.lock().unwrap();
        if let Some(batch) = batches.get_mut(batch_id) {
            batch.state = state;
            batch.results = Vec::new();
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn invoke_structured(
        &self,
        prompt: &str,
        _format: &ResponseFormat,
    ) -> Result<Value, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let scripted = self.responses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| (self.responder)(prompt)))
    }

    fn as_batch(&self) -> Option<&dyn BatchLlmProvider> {
        self.batching.then_some(self as &dyn BatchLlmProvider)
    }
}

#[async_trait]
impl BatchLlmProvider for MockProvider {
    async fn submit_batch(&self, requests: &[BatchRequest]) -> Result<BatchSubmission, LlmError> {
        let batch_id = format!(
            "mock-batch-{}",
            self.batch_counter.fetch_add(1, Ordering::SeqCst)
        );
        self.batches.lock().unwrap().insert(
            batch_id.clone(),
            MockBatch {
                requests: requests.to_vec(),
                state: BatchState::InProgress,
                results: Vec::new(),
            },
        );
        Ok(BatchSubmission {
            batch_id,
            request_count: requests.len(),
        })
    }

    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus, LlmError> {
        let batches = self.batches.lock().unwrap();
        let batch = batches
            .get(batch_id)
            .ok_or_else(|| LlmError::Provider(format!("unknown batch '{batch_id}'")))?;
        Ok(BatchStatus {
            batch_id: batch_id.to_string(),
            state: batch.state,
        })
    }

    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>, LlmError> {
        let batches = self.batches.lock().unwrap();
        let batch = batches
            .get(batch_id)
            .ok_or_else(|| LlmError::Provider(format!("unknown batch '{batch_id}'")))?;
        if batch.state != BatchState::Completed {
            return Err(LlmError::BatchNotReady {
                batch_id: batch_id.to_string(),
            });
        }
        Ok(batch.results.clone())
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<(), LlmError> {
        let mut batches = self.batches.lock().unwrap();
        if let Some(batch) = batches.get_mut(batch_id) {
            batch.state = BatchState::Cancelled;
        }
        Ok(())
    }
}
