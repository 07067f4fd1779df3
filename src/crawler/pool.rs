//! Bounded pool of reusable render handles for detail pages
//!
//! The pool holds K handles behind a counting semaphore. A task acquires a
//! handle, navigates, and the returned guard puts the handle back when it is
//! dropped, whether the task succeeded or not. Waiters are served in FIFO
//! order because the semaphore is fair.

use crate::crawler::Pacer;
use crate::extract::ExtractionStrategy;
use crate::record::{DetailRecord, StubRecord};
use crate::render::{navigate_with_timeout, RenderError, Renderer};
use futures::future::join_all;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use url::Url;

/// Result of one detail fetch
#[derive(Debug)]
pub enum DetailOutcome {
    Fetched(DetailRecord),
    /// The detail page was a challenge page
    Blocked,
    Failed(RenderError),
}

pub struct RenderPool {
    handles: Vec<Box<dyn Renderer>>,
    free: Mutex<Vec<usize>>,
    permits: Semaphore,
}

/// A checked-out render handle, returned to the pool on drop
pub struct PooledRenderer<'a> {
    pool: &'a RenderPool,
    index: usize,
    _permit: SemaphorePermit<'a>,
}

impl RenderPool {
    pub fn new(handles: Vec<Box<dyn Renderer>>) -> Self {
        let permits = Semaphore::new(handles.len());
        if handles.is_empty() {
            permits.close();
        }
        let free = (0..handles.len()).rev().collect();

        Self {
            handles,
            free: Mutex::new(free),
            permits,
        }
    }

    /// Number of handles, which is also the concurrency ceiling
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Handles not currently checked out
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free handle
    pub async fn acquire(&self) -> Result<PooledRenderer<'_>, RenderError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::PoolClosed)?;
        let index = self.free_list().pop().ok_or(RenderError::PoolClosed)?;

        Ok(PooledRenderer {
            pool: self,
            index,
            _permit: permit,
        })
    }

    fn free_list(&self) -> MutexGuard<'_, Vec<usize>> {
        // The list is only pushed and popped, so a poisoned lock still holds
        // consistent data
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches and extracts every stub's detail page
    ///
    /// All fetches are started together and awaited together; the returned
    /// outcomes are in the same order as `stubs`. At most `size()` navigations
    /// are in flight at any instant.
    pub async fn fetch_details(
        &self,
        stubs: &[StubRecord],
        strategy: &dyn ExtractionStrategy,
        timeout: Duration,
        pacer: &Pacer,
    ) -> Vec<DetailOutcome> {
        let tasks = stubs
            .iter()
            .map(|stub| self.fetch_one(stub, strategy, timeout, pacer));
        join_all(tasks).await
    }

    async fn fetch_one(
        &self,
        stub: &StubRecord,
        strategy: &dyn ExtractionStrategy,
        timeout: Duration,
        pacer: &Pacer,
    ) -> DetailOutcome {
        let url = match Url::parse(&stub.source_url) {
            Ok(url) => url,
            Err(_) => {
                return DetailOutcome::Failed(RenderError::InvalidUrl {
                    url: stub.source_url.clone(),
                })
            }
        };

        let renderer = match self.acquire().await {
            Ok(renderer) => renderer,
            Err(e) => return DetailOutcome::Failed(e),
        };

        pacer.pause().await;

        let document = match navigate_with_timeout(&*renderer, &url, timeout).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Detail fetch failed for {}: {}", stub.external_id, e);
                return DetailOutcome::Failed(e);
            }
        };

        match strategy.extract_detail(&document) {
            Some(detail) => {
                tracing::debug!(
                    "Fetched detail for {} (duration: {:?})",
                    stub.external_id,
                    detail.duration
                );
                DetailOutcome::Fetched(detail)
            }
            None => {
                tracing::warn!("Detail page for {} is a challenge page", stub.external_id);
                DetailOutcome::Blocked
            }
        }
    }
}

impl Deref for PooledRenderer<'_> {
    type Target = dyn Renderer;

    fn deref(&self) -> &Self::Target {
        self.pool.handles[self.index].as_ref()
    }
}

impl Drop for PooledRenderer<'_> {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so the handle is back in
        // the free list by the time a waiter is woken
        self.pool.free_list().push(self.index);
    }
}
