//! Patient list browsing: query state, last-request-wins reloads and the
//! table/card display switch.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{PageSize, SortDirection, SortField, ViewMode},
    protocol::{ListQuery, PatientPage, PatientRecord},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    ClientError, ClientSettings, ControllerEvent, EventSource, Outcome, PatientDirectory,
    EVENT_CHANNEL_CAPACITY,
};

/// Owned copy of everything a renderer needs, taken under one lock so rows
/// and page counts always belong together.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientListSnapshot {
    /// Query the next reload will send.
    pub query: ListQuery,
    /// Query the displayed rows answer, if any page has loaded yet.
    pub applied_query: Option<ListQuery>,
    pub patients: Vec<PatientRecord>,
    pub total_pages: u32,
    pub view_mode: ViewMode,
    pub loading: bool,
    pub last_error: Option<ClientError>,
}

impl PatientListSnapshot {
    /// Page the displayed rows belong to. Differs from `query.page` while a
    /// request is pending or after a failed one.
    pub fn displayed_page(&self) -> u32 {
        self.applied_query
            .as_ref()
            .map_or(self.query.page, |applied| applied.page)
    }
}

#[derive(Default)]
struct ListState {
    query: ListQuery,
    applied_query: Option<ListQuery>,
    patients: Vec<PatientRecord>,
    total_pages: u32,
    view_mode: ViewMode,
    issued: u64,
    last_error: Option<ClientError>,
}

impl ListState {
    /// Takes the next sequence number for the current query.
    fn issue(&mut self, loading: &AtomicU64) -> (u64, ListQuery) {
        self.issued += 1;
        loading.store(self.issued, Ordering::Release);
        (self.issued, self.query.clone())
    }
}

/// Clears the loading marker when the request it was armed for ends,
/// including when the fetch future is dropped mid-flight.
struct LoadingGuard<'a> {
    loading: &'a AtomicU64,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let _ = self.loading.compare_exchange(
            self.generation,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

pub struct PatientListController {
    directory: Arc<dyn PatientDirectory>,
    inner: Mutex<ListState>,
    /// Sequence number of the latest unresolved request, 0 when idle.
    loading: AtomicU64,
    events: broadcast::Sender<ControllerEvent>,
}

impl PatientListController {
    pub fn new(directory: Arc<dyn PatientDirectory>) -> Self {
        Self::new_with_settings(directory, &ClientSettings::default())
    }

    pub fn new_with_settings(directory: Arc<dyn PatientDirectory>, settings: &ClientSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = ListState {
            query: ListQuery {
                page_size: settings.default_page_size,
                ..ListQuery::default()
            },
            ..ListState::default()
        };
        Self {
            directory,
            inner: Mutex::new(state),
            loading: AtomicU64::new(0),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> PatientListSnapshot {
        let state = self.inner.lock().await;
        PatientListSnapshot {
            query: state.query.clone(),
            applied_query: state.applied_query.clone(),
            patients: state.patients.clone(),
            total_pages: state.total_pages,
            view_mode: state.view_mode,
            loading: self.loading.load(Ordering::Acquire) != 0,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn query(&self) -> ListQuery {
        self.inner.lock().await.query.clone()
    }

    pub async fn patients(&self) -> Vec<PatientRecord> {
        self.inner.lock().await.patients.clone()
    }

    pub async fn total_pages(&self) -> u32 {
        self.inner.lock().await.total_pages
    }

    pub async fn view_mode(&self) -> ViewMode {
        self.inner.lock().await.view_mode
    }

    pub async fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire) != 0
    }

    pub async fn last_error(&self) -> Option<ClientError> {
        self.inner.lock().await.last_error.clone()
    }

    /// Presentation only; never touches the network or the loaded rows.
    pub async fn set_view_mode(&self, mode: ViewMode) {
        self.inner.lock().await.view_mode = mode;
    }

    pub async fn toggle_view_mode(&self) -> ViewMode {
        let mut state = self.inner.lock().await;
        state.view_mode = state.view_mode.toggled();
        state.view_mode
    }

    pub async fn set_query(&self, q: impl Into<String>) -> Result<Outcome, ClientError> {
        let q = q.into();
        self.reload_with(move |query| {
            query.set_search(q);
            query.page = 1;
        })
        .await
    }

    pub async fn set_sort(&self, by: SortField, dir: SortDirection) -> Result<Outcome, ClientError> {
        self.reload_with(move |query| {
            query.sort_by = by;
            query.sort_dir = dir;
            query.page = 1;
        })
        .await
    }

    pub async fn set_page_size(&self, size: PageSize) -> Result<Outcome, ClientError> {
        self.reload_with(move |query| {
            query.page_size = size;
            query.page = 1;
        })
        .await
    }

    /// Replaces every query field at once and reloads with a single request.
    /// The page is taken as given (at least 1) instead of being reset.
    pub async fn set_list_query(&self, query: ListQuery) -> Result<Outcome, ClientError> {
        self.reload_with(move |current| {
            let ListQuery {
                page,
                page_size,
                sort_by,
                sort_dir,
                q,
            } = query;
            current.page = page.max(1);
            current.page_size = page_size;
            current.sort_by = sort_by;
            current.sort_dir = sort_dir;
            current.set_search(q.unwrap_or_default());
        })
        .await
    }

    /// Moves to page `page` when it lies in `1..=total_pages` and is not
    /// already displayed for the current filters; otherwise returns
    /// [`Outcome::Skipped`].
    pub async fn set_page(&self, page: u32) -> Result<Outcome, ClientError> {
        let (generation, query) = {
            let mut state = self.inner.lock().await;
            let target = ListQuery {
                page,
                ..state.query.clone()
            };
            if page < 1
                || page > state.total_pages
                || state.applied_query.as_ref() == Some(&target)
            {
                debug!(
                    page,
                    current = state.query.page,
                    total_pages = state.total_pages,
                    "ignoring page change"
                );
                return Ok(Outcome::Skipped);
            }
            state.query.page = page;
            state.issue(&self.loading)
        };
        self.fetch(generation, query).await
    }

    pub async fn next_page(&self) -> Result<Outcome, ClientError> {
        let current = self.inner.lock().await.query.page;
        self.set_page(current.saturating_add(1)).await
    }

    pub async fn previous_page(&self) -> Result<Outcome, ClientError> {
        let current = self.inner.lock().await.query.page;
        self.set_page(current.saturating_sub(1)).await
    }

    pub async fn reload(&self) -> Result<Outcome, ClientError> {
        self.reload_with(|_| {}).await
    }

    async fn reload_with(
        &self,
        mutate: impl FnOnce(&mut ListQuery),
    ) -> Result<Outcome, ClientError> {
        let (generation, query) = {
            let mut state = self.inner.lock().await;
            mutate(&mut state.query);
            state.issue(&self.loading)
        };
        self.fetch(generation, query).await
    }

    async fn fetch(&self, generation: u64, query: ListQuery) -> Result<Outcome, ClientError> {
        debug!(
            generation,
            page = query.page,
            page_size = query.page_size.get(),
            sort_by = %query.sort_by,
            sort_dir = %query.sort_dir,
            q = query.q.as_deref().unwrap_or(""),
            "requesting patient page"
        );
        let _loading = LoadingGuard {
            loading: &self.loading,
            generation,
        };
        let result = self.directory.list_patients(query.clone()).await;
        self.apply(generation, query, result).await
    }

    async fn apply(
        &self,
        generation: u64,
        query: ListQuery,
        result: Result<PatientPage, ClientError>,
    ) -> Result<Outcome, ClientError> {
        let mut state = self.inner.lock().await;
        if generation != state.issued {
            debug!(
                generation,
                latest = state.issued,
                "discarding stale patient page"
            );
            let _ = self.events.send(ControllerEvent::StaleResponseDiscarded {
                source: EventSource::PatientList,
                generation,
                latest: state.issued,
            });
            return Ok(Outcome::Stale);
        }
        let _ = self
            .loading
            .compare_exchange(generation, 0, Ordering::AcqRel, Ordering::Acquire);

        match result {
            Ok(page) => {
                state.patients = page.patients;
                state.total_pages = page.total_pages;
                state.applied_query = Some(query);
                state.last_error = None;
                info!(
                    generation,
                    page = state.query.page,
                    total_pages = state.total_pages,
                    count = state.patients.len(),
                    "patient page updated"
                );
                let _ = self.events.send(ControllerEvent::PatientsUpdated {
                    generation,
                    page: state.query.page,
                    total_pages: state.total_pages,
                    count: state.patients.len(),
                });
                Ok(Outcome::Applied)
            }
            Err(error) => {
                warn!(generation, %error, "patient list request failed");
                state.last_error = Some(error.clone());
                let _ = self.events.send(ControllerEvent::PatientListFailed {
                    generation,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
