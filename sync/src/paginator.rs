//! Offset-based incremental loading of the article list.
//!
//! A reset (new key or filters) cancels the in-flight page request and
//! starts over from offset 0. "Load more" is idempotent: it does nothing
//! while a load is outstanding or once the list is exhausted.

use crate::config::ArticlesConfig;
use crate::diagnostics::{DiagnosticScope, FailureRecord, classify};
use crate::fetch::{FetchOutcome, FetchRequest, Transport, fetch};
use crate::sequencer::{RequestSlot, SlotId};
use riskboard_async_utils::CancelSlot;
use riskboard_protocol::{Article, ArticlePage, SelectionKey};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const LIST_UNAVAILABLE: &str = "The article list could not be loaded.";

/// Key plus active filters; any change resets the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub key: SelectionKey,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(key: impl Into<SelectionKey>) -> Self {
        Self {
            key: key.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Start over from the first page.
    Reset,
    /// Append the next page.
    More,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageState {
    pub query: Option<ListQuery>,
    /// Arrival order.
    pub items: Vec<Article>,
    pub offset: usize,
    pub total: u64,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<FailureRecord>,
}

impl PageState {
    fn starting(query: &ListQuery) -> Self {
        Self {
            query: Some(query.clone()),
            has_more: true,
            loading: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// A page arrived and was applied.
    Loaded(PageState),
    /// The request failed; the failure is attached to the state.
    Failed(PageState),
    /// Nothing to do: a load is already running or the list is exhausted.
    Skipped(PageState),
    /// A newer load for this list took over while the request was in flight.
    Superseded,
    /// The request was cancelled.
    Cancelled,
}

impl PageOutcome {
    pub fn state(&self) -> Option<&PageState> {
        match self {
            Self::Loaded(state) | Self::Failed(state) | Self::Skipped(state) => Some(state),
            Self::Superseded | Self::Cancelled => None,
        }
    }
}

pub struct Paginator {
    transport: Arc<dyn Transport>,
    endpoint: String,
    page_size: usize,
    scope: DiagnosticScope,
    slot: RequestSlot,
    in_flight: CancelSlot,
    state: Mutex<PageState>,
}

impl Paginator {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>, page_size: usize) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            page_size: page_size.max(1),
            scope: DiagnosticScope::new("ART"),
            slot: RequestSlot::new(SlotId::Articles),
            in_flight: CancelSlot::new(),
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &ArticlesConfig) -> Self {
        Self::new(transport, config.endpoint.clone(), config.page_size)
            .with_scope(DiagnosticScope::new(&config.scope))
    }

    pub fn with_scope(mut self, scope: DiagnosticScope) -> Self {
        self.scope = scope;
        self
    }

    /// Current list state.
    pub fn state(&self) -> PageState {
        self.lock().clone()
    }

    /// Load the first page (`Reset`) or the next one (`More`).
    ///
    /// `More` for a query other than the current one is treated as a reset.
    pub async fn load_page(&self, query: &ListQuery, mode: LoadMode) -> PageOutcome {
        let (ticket, armed, request, reset) = {
            let mut state = self.lock();
            let mode = if mode == LoadMode::More && state.query.as_ref() != Some(query) {
                LoadMode::Reset
            } else {
                mode
            };

            match mode {
                LoadMode::More => {
                    if state.loading || !state.has_more {
                        tracing::debug!(
                            key = %query.key,
                            loading = state.loading,
                            has_more = state.has_more,
                            "skipping load more"
                        );
                        return PageOutcome::Skipped(state.clone());
                    }
                    state.loading = true;
                    let request = self.request(query, state.offset);
                    (self.slot.begin(), self.in_flight.arm(), request, false)
                }
                LoadMode::Reset => {
                    *state = PageState::starting(query);
                    (self.slot.begin(), self.in_flight.arm(), self.request(query, 0), true)
                }
            }
        };

        let outcome = match fetch(self.transport.as_ref(), &request, armed.token()).await {
            FetchOutcome::Data(Value::Null) => FetchOutcome::Data(ArticlePage::default()),
            other => other.decode::<ArticlePage>(),
        };

        if outcome.is_cancelled() {
            tracing::debug!(key = %query.key, "page request cancelled");
            return PageOutcome::Cancelled;
        }

        let mut state = self.lock();
        if !self.slot.is_current(&ticket) {
            tracing::debug!(key = %query.key, sequence = ticket.sequence(), "discarding superseded page");
            return PageOutcome::Superseded;
        }
        self.in_flight.release(&armed);
        state.loading = false;

        match outcome {
            FetchOutcome::Data(page) => {
                let received = page.items.len();
                state.items.extend(page.items);
                state.offset += received;
                state.total = page.total;
                state.has_more = received > 0
                    && (state.offset as u64) < page.total
                    && page.has_more.unwrap_or(true);
                state.error = None;
                tracing::debug!(
                    key = %query.key,
                    offset = state.offset,
                    total = state.total,
                    has_more = state.has_more,
                    "page loaded"
                );
                PageOutcome::Loaded(state.clone())
            }
            FetchOutcome::Failed(failure) => {
                let record = classify(&failure, &self.scope, LIST_UNAVAILABLE);
                tracing::warn!(key = %query.key, code = %record.code, reset, "page load failed");
                if reset {
                    state.items.clear();
                    state.offset = 0;
                    state.total = 0;
                    state.has_more = false;
                }
                state.error = Some(record);
                PageOutcome::Failed(state.clone())
            }
            FetchOutcome::Cancelled => PageOutcome::Cancelled,
        }
    }

    /// Abort the in-flight request and supersede it (view teardown).
    pub fn cancel(&self) {
        let mut state = self.lock();
        self.slot.invalidate();
        self.in_flight.cancel();
        state.loading = false;
    }

    fn request(&self, query: &ListQuery, offset: usize) -> FetchRequest {
        let mut request = FetchRequest::new(self.endpoint.clone())
            .param("ip", &query.key)
            .param("limit", self.page_size)
            .param("offset", offset);
        for (name, value) in &query.filters {
            request = request.param(name.clone(), value);
        }
        request
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
