// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced remote wrapper for consistent observability

use crate::remote::{Fetched, PutSummary, RemoteError, RemoteReplica};
use async_trait::async_trait;
use fleetlog_core::{Record, Watermark};
use tracing::Instrument;

/// Wrapper that adds tracing to any RemoteReplica
#[derive(Clone)]
pub struct TracedRemote<R> {
    inner: R,
}

impl<R> TracedRemote<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

fn log_failure(error: &RemoteError, elapsed_ms: u64, message: &str) {
    if error.is_transient() {
        tracing::warn!(elapsed_ms, error = %error, "{} (transient)", message);
    } else {
        tracing::error!(elapsed_ms, error = %error, "{}", message);
    }
}

#[async_trait]
impl<R: RemoteReplica> RemoteReplica for TracedRemote<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_after(&self, after: &Watermark) -> Result<Fetched, RemoteError> {
        let span = tracing::info_span!("remote.fetch_after", remote = self.inner.name(), after = %after);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.fetch_after(after).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(fetched) if fetched.damaged.is_empty() => {
                    tracing::info!(elapsed_ms, count = fetched.records.len(), "fetched")
                }
                Ok(fetched) => tracing::warn!(
                    elapsed_ms,
                    count = fetched.records.len(),
                    damaged = fetched.damaged.len(),
                    "fetched with damaged objects skipped"
                ),
                Err(e) => log_failure(e, elapsed_ms, "fetch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn put(&self, records: &[Record]) -> Result<PutSummary, RemoteError> {
        let span = tracing::info_span!("remote.put", remote = self.inner.name(), count = records.len());
        async {
            let start = std::time::Instant::now();
            let result = self.inner.put(records).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(summary) => tracing::info!(
                    elapsed_ms,
                    stored = summary.stored,
                    already_present = summary.already_present,
                    "stored"
                ),
                Err(e) => log_failure(e, elapsed_ms, "put failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn acknowledge(&self, mark: &Watermark) -> Result<(), RemoteError> {
        let span = tracing::info_span!("remote.acknowledge", remote = self.inner.name(), mark = %mark);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.acknowledge(mark).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "acknowledged"),
                Err(e) => log_failure(e, elapsed_ms, "acknowledge failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn acknowledged(&self) -> Result<Watermark, RemoteError> {
        let result = self.inner.acknowledged().await;
        tracing::trace!(remote = self.inner.name(), ok = result.is_ok(), "read acknowledged mark");
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
