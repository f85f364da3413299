// SPDX-License-Identifier: MIT
//
// genpass: Secure Token Generator
// Copyright (c) 2025 genpass Contributors

//! Batch and streaming generation
//!
//! A batch either returns all `count` strings in input order or a single
//! error; partial results are never handed out. The parallel path bounds
//! in-flight tasks with a per-batch semaphore and writes each result into its
//! own pre-sized slot, so completion order never affects output order.

use crate::config::{GeneratorConfig, ValidatedConfig};
use crate::generator::CryptoGenerator;
use crate::{Error, Result};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

impl CryptoGenerator {
    /// Generate `config.count` strings in order
    ///
    /// Fails with the first error encountered. Cancelling `cancel`, or the
    /// configured timeout expiring, stops in-flight work and yields
    /// [`Error::Cancelled`].
    #[instrument(skip_all, fields(count = config.count, parallel = config.parallel))]
    pub async fn generate_batch(
        &self,
        config: &GeneratorConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let config = config.validate()?;

        // Cancelled on every exit so nothing outlives the call
        let batch_cancel = cancel.child_token();
        let _guard = batch_cancel.clone().drop_guard();

        let run = self.run_batch(&config, &batch_cancel);
        let result = match config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Batch timed out after {:?}", limit);
                    Err(Error::Cancelled)
                }
            },
            None => run.await,
        };

        if let Err(e) = &result {
            debug!("Batch failed: {}", e);
        }
        result
    }

    async fn run_batch(
        &self,
        config: &ValidatedConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if !config.parallel() || config.count() == 1 {
            return self.run_sequential(config, cancel).await;
        }
        self.run_parallel(config, cancel).await
    }

    async fn run_sequential(
        &self,
        config: &ValidatedConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(config.count());
        for index in 0..config.count() {
            let s = self
                .generate_validated(config, cancel)
                .await
                .map_err(|e| annotate(index, e))?;
            results.push(s);
        }
        debug!("Generated {} strings sequentially", results.len());
        Ok(results)
    }

    async fn run_parallel(
        &self,
        config: &ValidatedConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let count = config.count();
        let config = Arc::new(config.clone());
        let slots = Arc::new(Semaphore::new(config.workers()));
        let mut tasks = JoinSet::new();

        for index in 0..count {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&slots).acquire_owned() => permit
                    .map_err(|_| Error::Internal("worker pool closed".to_string()))?,
            };

            let generator = self.clone();
            let config = Arc::clone(&config);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = generator.generate_validated(&config, &cancel).await;
                if result.is_err() {
                    // Stop dispatch and the other in-flight tasks
                    cancel.cancel();
                }
                (index, result)
            });
        }

        let mut results: Vec<Option<String>> = vec![None; count];
        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined?;
            match result {
                Ok(s) => results[index] = Some(s),
                // Keep draining: a real failure may still be on its way
                Err(e) if e.is_cancelled() => cancelled = true,
                Err(e) => return Err(annotate(index, e)),
            }
        }

        if cancelled {
            return Err(Error::Cancelled);
        }
        debug!("Generated {} strings across {} workers", count, config.workers());
        results
            .into_iter()
            .map(|slot| slot.ok_or(Error::Cancelled))
            .collect()
    }

    /// Lazily generate `config.count` strings, one per poll
    ///
    /// Items are produced sequentially. An invalid configuration yields a
    /// single error. Cancellation, or the configured timeout expiring, yields
    /// one [`Error::Cancelled`] and ends the stream. The timeout runs from the
    /// first poll. Dropping the stream early stops all further entropy use.
    pub fn generate_stream(
        &self,
        config: &GeneratorConfig,
        cancel: &CancellationToken,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        let (config, error) = match config.validate() {
            Ok(config) => (Some(config), None),
            Err(e) => (None, Some(e)),
        };
        let state = StreamState {
            generator: self.clone(),
            config,
            error,
            cancel: cancel.clone(),
            deadline: None,
            next: 0,
        };

        stream::unfold(state, |mut state| async move {
            if let Some(e) = state.error.take() {
                return Some((Err(e), state));
            }

            let config = state.config.as_ref()?;
            if state.next >= config.count() {
                return None;
            }

            let deadline = config
                .timeout()
                .map(|limit| *state.deadline.get_or_insert_with(|| Instant::now() + limit));

            let result = if state.cancel.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                let pull = state.generator.generate_validated(config, &state.cancel);
                match deadline {
                    Some(deadline) if Instant::now() >= deadline => Err(Error::Cancelled),
                    Some(deadline) => match tokio::time::timeout_at(deadline, pull).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!("Stream timed out after {} items", state.next);
                            Err(Error::Cancelled)
                        }
                    },
                    None => pull.await,
                }
            };

            state.next += 1;
            if matches!(&result, Err(e) if e.is_cancelled()) {
                state.config = None;
            }
            Some((result, state))
        })
    }
}

struct StreamState {
    generator: CryptoGenerator,
    config: Option<ValidatedConfig>,
    error: Option<Error>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    next: usize,
}

fn annotate(index: usize, e: Error) -> Error {
    if e.is_cancelled() {
        e
    } else {
        Error::at_index(index, e)
    }
}
