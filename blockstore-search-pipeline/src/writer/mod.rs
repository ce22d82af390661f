//! Retrying bulk writer.
//!
//! Submits one batch of index actions to the search index, retrying the whole
//! batch on transient failures according to a [`RetryPolicy`]. The writer has
//! no state of its own besides the provider handle and the policy; a failed
//! batch is reported to the caller and never kept.

mod retry;

pub use retry::{
    retry_with_policy, Backoff, RetryError, RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT,
    DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF,
};

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::errors::WriteError;
use blockstore_search_repository::{BulkResponse, SearchIndexError, SearchIndexProvider};
use blockstore_search_shared::{IndexAction, IndexSchemaDescriptor};

pub struct RetryingBulkWriter {
    provider: Arc<dyn SearchIndexProvider>,
    policy: RetryPolicy,
}

impl RetryingBulkWriter {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &Arc<dyn SearchIndexProvider> {
        &self.provider
    }

    /// Submit a batch, retrying the full batch on transient failures.
    ///
    /// Each attempt is bounded by the policy's attempt timeout; an attempt
    /// that runs over is a transient failure. When the request succeeds but
    /// the index rejects some actions, the batch is not retried and the
    /// per-item results are returned in [`WriteError::PartialFailure`].
    ///
    /// # Returns
    ///
    /// * `Ok(BulkResponse)` - Every action was accepted
    /// * `Err(WriteError)` - The batch failed, fully or partially
    #[instrument(skip(self, schema, actions), fields(index = %schema.name(), count = actions.len()))]
    pub async fn submit(
        &self,
        schema: &IndexSchemaDescriptor,
        actions: &[IndexAction],
    ) -> Result<BulkResponse, WriteError> {
        if actions.is_empty() {
            return Ok(BulkResponse::default());
        }

        let provider = self.provider.as_ref();
        let attempt_timeout = self.policy.attempt_timeout;

        let submit_once = move |attempt: u32| async move {
            debug!(attempt, "Submitting batch");
            match attempt_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, provider.submit_batch(schema, actions)).await {
                        Ok(result) => result,
                        Err(_) => Err(SearchIndexError::timeout(format!(
                            "Bulk submit exceeded {} ms",
                            limit.as_millis()
                        ))),
                    }
                }
                None => provider.submit_batch(schema, actions).await,
            }
        };

        let result =
            retry_with_policy(&self.policy, SearchIndexError::is_transient, submit_once).await;

        let response = result.map_err(|e| {
            let write_error = match e {
                RetryError::Permanent { error, .. } => WriteError::Rejected(error),
                RetryError::Exhausted { attempts, error } => WriteError::RetriesExhausted {
                    attempts,
                    source: error,
                },
            };
            error!(error = %write_error, "Bulk submit failed");
            write_error
        })?;

        if response.has_failures() {
            let failed = response.total() - response.succeeded();
            error!(failed, total = response.total(), "Index rejected actions in batch");
            return Err(WriteError::PartialFailure { response });
        }

        debug!(total = response.total(), "Batch accepted");
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use blockstore_search_repository::{
        BulkResponse, InMemorySearchIndex, SearchIndexError, SearchIndexProvider,
    };
    use blockstore_search_shared::{
        IndexAction, IndexSchemaDescriptor, SearchRequest, SearchResult, SuggestRequest,
        SuggestResult,
    };

    /// Provider that fails scripted calls before delegating to an in-memory index.
    #[derive(Default)]
    pub struct FlakyProvider {
        pub inner: InMemorySearchIndex,
        pub submit_calls: AtomicUsize,
        pub search_calls: AtomicUsize,
        pub count_calls: AtomicUsize,
        failures: Mutex<VecDeque<SearchIndexError>>,
        read_failures: Mutex<VecDeque<SearchIndexError>>,
        submit_delay: Mutex<Option<Duration>>,
    }

    impl FlakyProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `count` submits with `error`.
        pub async fn fail_next(&self, count: usize, error: SearchIndexError) {
            let mut failures = self.failures.lock().await;
            for _ in 0..count {
                failures.push_back(error.clone());
            }
        }

        /// Fail the next `count` searches or counts with `error`.
        pub async fn fail_next_reads(&self, count: usize, error: SearchIndexError) {
            let mut failures = self.read_failures.lock().await;
            for _ in 0..count {
                failures.push_back(error.clone());
            }
        }

        /// Make every submit take `delay` before answering.
        pub async fn delay_submits(&self, delay: Duration) {
            *self.submit_delay.lock().await = Some(delay);
        }

        pub fn submits(&self) -> usize {
            self.submit_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchIndexProvider for FlakyProvider {
        async fn ensure_index(
            &self,
            schema: &IndexSchemaDescriptor,
        ) -> Result<(), SearchIndexError> {
            self.inner.ensure_index(schema).await
        }

        async fn submit_batch(
            &self,
            schema: &IndexSchemaDescriptor,
            actions: &[IndexAction],
        ) -> Result<BulkResponse, SearchIndexError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.submit_delay.lock().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.failures.lock().await.pop_front() {
                return Err(error);
            }
            self.inner.submit_batch(schema, actions).await
        }

        async fn search(
            &self,
            schema: &IndexSchemaDescriptor,
            request: &SearchRequest,
        ) -> Result<SearchResult, SearchIndexError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.read_failures.lock().await.pop_front() {
                return Err(error);
            }
            self.inner.search(schema, request).await
        }

        async fn suggest(
            &self,
            schema: &IndexSchemaDescriptor,
            request: &SuggestRequest,
        ) -> Result<SuggestResult, SearchIndexError> {
            self.inner.suggest(schema, request).await
        }

        async fn count(&self, schema: &IndexSchemaDescriptor) -> Result<u64, SearchIndexError> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.read_failures.lock().await.pop_front() {
                return Err(error);
            }
            self.inner.count(schema).await
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            self.inner.health_check().await
        }

        async fn close(&self) -> Result<(), SearchIndexError> {
            self.inner.close().await
        }
    }
}
