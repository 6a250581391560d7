//! Page fetching.
//!
//! Every reload builds the current query, cancels the reload before it, and
//! spawns the new fetch. Each reload gets a generation number; when a fetch
//! completes, its rows are applied only if no newer reload has started since,
//! so the result relation always reflects the most recent request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::Instrument;

use horizon_grid_core::logging::{span_names, targets};
use horizon_grid_core::{AsyncCancellationToken, AsyncRuntime, AsyncTaskHandle};

use crate::error::{GridError, Result};
use crate::query::{FetchQuery, QueryPlan};
use crate::relation::{FetchStatus, ResultRelation};
use crate::service::DataService;
use crate::state::GridState;

/// How a reload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows were applied to the result relation.
    Applied { generation: u64, rows: usize },
    /// A newer reload started first; the rows were discarded.
    Superseded { generation: u64 },
    /// The service failed; the relation status carries the message.
    Failed { generation: u64, message: String },
}

struct FetchInner<S> {
    plan: QueryPlan,
    state: Arc<GridState>,
    relation: Arc<ResultRelation>,
    service: Arc<S>,
    runtime: Arc<AsyncRuntime>,
    in_flight: Mutex<Option<AsyncCancellationToken>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

/// Shared handle that issues reloads for one grid.
pub(crate) struct Fetcher<S> {
    inner: Arc<FetchInner<S>>,
}

impl<S> Clone for Fetcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DataService> Fetcher<S> {
    pub(crate) fn new(
        plan: QueryPlan,
        state: Arc<GridState>,
        relation: Arc<ResultRelation>,
        service: Arc<S>,
        runtime: Arc<AsyncRuntime>,
    ) -> Self {
        Self {
            inner: Arc::new(FetchInner {
                plan,
                state,
                relation,
                service,
                runtime,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn plan(&self) -> &QueryPlan {
        &self.inner.plan
    }

    /// The query the next reload would issue.
    pub(crate) fn current_query(&self) -> Result<FetchQuery> {
        let state = &self.inner.state;
        Ok(self.inner.plan.build(&state.sort(), state.row_count())?)
    }

    /// Start a reload, cancelling the one in flight.
    pub(crate) fn reload(&self) -> Result<AsyncTaskHandle<FetchOutcome>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(GridError::Closed);
        }

        let query = match self.current_query() {
            Ok(query) => query,
            Err(err) => {
                inner.relation.set_status(FetchStatus::Failed(err.to_string()));
                return Err(err);
            }
        };

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        inner.relation.set_status(FetchStatus::Loading);

        let task_inner = Arc::clone(inner);
        let (handle, token) = inner
            .runtime
            .spawn_cancellable(move |_token| async move { task_inner.run(query, generation).await });

        if let Some(previous) = inner.in_flight.lock().replace(token) {
            previous.cancel();
        }
        tracing::debug!(target: targets::FETCH, generation, "reload started");
        Ok(handle)
    }

    /// Stop issuing reloads and cancel the one in flight.
    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(token) = self.inner.in_flight.lock().take() {
            token.cancel();
        }
    }
}

impl<S: DataService> FetchInner<S> {
    async fn run(&self, query: FetchQuery, generation: u64) -> FetchOutcome {
        let span = tracing::info_span!(target: targets::FETCH, span_names::FETCH_PAGE, generation);
        let result = self
            .service
            .fetch_page(&query, self.plan.shape())
            .instrument(span)
            .await;

        if self.closed.load(Ordering::Acquire)
            || self.generation.load(Ordering::Acquire) != generation
        {
            tracing::debug!(target: targets::FETCH, generation, "discarding superseded page");
            return FetchOutcome::Superseded { generation };
        }

        match result {
            Ok(rows) => {
                let count = rows.len();
                self.relation.reset(rows);
                self.relation.set_status(FetchStatus::Ready);
                tracing::debug!(target: targets::FETCH, generation, rows = count, "page applied");
                FetchOutcome::Applied {
                    generation,
                    rows: count,
                }
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(target: targets::FETCH, generation, error = %message, "page fetch failed");
                self.relation.set_status(FetchStatus::Failed(message.clone()));
                FetchOutcome::Failed {
                    generation,
                    message,
                }
            }
        }
    }
}
