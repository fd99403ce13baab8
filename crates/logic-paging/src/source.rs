//! Incremental paging over one logical list.
//!
//! A [`PagingSource`] is owned by the UI surface showing the list and is
//! driven from the foreground context. Fetches run through the dispatcher in
//! the background; their completions come back as foreground tasks that hold
//! only a weak reference to the list state, so a source dropped mid-fetch
//! simply never hears back.

use std::{hash::Hash, sync::Arc};

use logic_core::{DispatchError, Dispatcher, DomainErrorPolicy, ResponsePayload};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::{
    merge::IdentityList,
    page::{FinishOnError, PageResult, PageSpec, TotalPages},
    phase::{Phase, PhaseMachine},
};

/// Items from the end of the list that trigger the next page.
pub const LOAD_MORE_THRESHOLD: usize = 3;

/// Immutable view of a list for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PagingSnapshot<T> {
    pub items: Vec<T>,
    /// 1-based, 0 before the first successful fetch.
    pub current_page: u32,
    pub total_pages: TotalPages,
    pub phase: Phase,
    pub last_error: Option<DispatchError>,
}

/// Called on the foreground context after every state change.
pub type UpdateListener<T> = Arc<dyn Fn(&PagingSnapshot<T>) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Refresh,
    More(u32),
    Reload(u32),
}

impl Attempt {
    fn page(self) -> u32 {
        match self {
            Self::Initial | Self::Refresh => 1,
            Self::More(page) | Self::Reload(page) => page,
        }
    }

    fn loading_phase(self) -> Phase {
        match self {
            Self::Initial | Self::Refresh => Phase::LoadingInitial,
            Self::More(_) | Self::Reload(_) => Phase::LoadingMore,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Refresh => "refresh",
            Self::More(_) => "more",
            Self::Reload(_) => "reload",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    attempt: Attempt,
    /// Phase to return to after a successful page reload.
    resume: Phase,
}

struct PagingState<T, K> {
    list: IdentityList<T, K>,
    current_page: u32,
    total_pages: TotalPages,
    machine: PhaseMachine,
    last_error: Option<DispatchError>,
    in_flight: Option<InFlight>,
    failed: Option<(Attempt, Phase)>,
    next_ticket: u64,
    listener: Option<UpdateListener<T>>,
}

impl<T, K> PagingState<T, K>
where
    T: Clone,
    K: Eq + Hash,
{
    fn new() -> Self {
        Self {
            list: IdentityList::new(),
            current_page: 0,
            total_pages: TotalPages::Unknown,
            machine: PhaseMachine::new(),
            last_error: None,
            in_flight: None,
            failed: None,
            next_ticket: 0,
            listener: None,
        }
    }

    fn snapshot(&self) -> PagingSnapshot<T> {
        PagingSnapshot {
            items: self.list.items().to_vec(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            phase: self.machine.phase(),
            last_error: self.last_error.clone(),
        }
    }

    fn track(&mut self, attempt: Attempt, resume: Phase) -> u64 {
        self.next_ticket += 1;
        self.in_flight = Some(InFlight {
            ticket: self.next_ticket,
            attempt,
            resume,
        });
        self.failed = None;
        self.last_error = None;
        self.next_ticket
    }

    fn apply_page<F>(
        &mut self,
        in_flight: InFlight,
        page: PageResult<T>,
        policy: FinishOnError,
        key_of: F,
    ) where
        F: Fn(&T) -> K,
    {
        let PageResult { items, total_pages } = page;
        if in_flight.attempt == Attempt::Refresh {
            self.list.clear();
        }
        let outcome = self.list.merge(items, key_of);
        self.total_pages = total_pages;

        let next = match in_flight.attempt {
            Attempt::Initial | Attempt::Refresh | Attempt::More(_) => {
                self.current_page = in_flight.attempt.page();
                let empty = outcome.appended == 0 && policy.finishes_on_empty();
                if empty || total_pages.is_reached(self.current_page) {
                    Phase::Exhausted
                } else {
                    Phase::Loaded
                }
            }
            Attempt::Reload(_) if total_pages.is_reached(self.current_page) => Phase::Exhausted,
            Attempt::Reload(_) => in_flight.resume,
        };

        debug!(
            attempt = in_flight.attempt.as_str(),
            page = in_flight.attempt.page(),
            appended = outcome.appended,
            replaced = outcome.replaced,
            total_pages = ?total_pages,
            next = %next,
            "page merged"
        );
        self.settle(next);
    }

    fn apply_failure(&mut self, in_flight: InFlight, error: DispatchError, policy: FinishOnError) {
        if let Attempt::More(page) = in_flight.attempt
            && policy.finishes_on_trailing_error()
        {
            warn!(
                page,
                code = error.code(),
                error = %error,
                "trailing page failed; treating list as exhausted"
            );
            self.settle(Phase::Exhausted);
            return;
        }

        warn!(
            attempt = in_flight.attempt.as_str(),
            page = in_flight.attempt.page(),
            code = error.code(),
            error = %error,
            "page load failed"
        );
        self.failed = Some((in_flight.attempt, in_flight.resume));
        self.last_error = Some(error);
        self.settle(Phase::Failed);
    }

    fn settle(&mut self, next: Phase) {
        if let Err(err) = self.machine.settle(next) {
            warn!(error = %err, "page completion found no load in flight");
        }
    }
}

/// Hand the new state to the listener outside the lock.
fn publish<T, K>(state: MutexGuard<'_, PagingState<T, K>>)
where
    T: Clone,
    K: Eq + Hash,
{
    let Some(listener) = state.listener.clone() else {
        return;
    };
    let snapshot = state.snapshot();
    drop(state);
    listener(&snapshot);
}

struct Shared<R, T, K> {
    spec: PageSpec<R, T, K>,
    state: Mutex<PagingState<T, K>>,
}

impl<R, T, K> Shared<R, T, K>
where
    T: Clone,
    K: Eq + Hash,
{
    fn complete(&self, ticket: u64, result: Result<R, DispatchError>) {
        let mut state = self.state.lock();
        let Some(in_flight) = state
            .in_flight
            .take_if(|in_flight| in_flight.ticket == ticket)
        else {
            trace!(ticket, "discarding stale page completion");
            return;
        };

        let policy = self.spec.finish_on_error;
        match result {
            Ok(payload) => {
                let page = (self.spec.on_response)(payload);
                state.apply_page(in_flight, page, policy, |item| (self.spec.id)(item));
            }
            Err(error) => state.apply_failure(in_flight, error, policy),
        }
        publish(state);
    }
}

/// Paged list state plus the operations a list view drives it with.
///
/// At most one fetch is in flight; load requests made while one is running
/// are ignored, never queued.
pub struct PagingSource<R, T, K> {
    shared: Arc<Shared<R, T, K>>,
    dispatcher: Dispatcher,
}

impl<R, T, K> PagingSource<R, T, K>
where
    R: ResponsePayload,
    T: Clone + Send + 'static,
    K: Eq + Hash + Send + 'static,
{
    pub fn new(dispatcher: Dispatcher, spec: PageSpec<R, T, K>) -> Self {
        Self {
            shared: Arc::new(Shared {
                spec,
                state: Mutex::new(PagingState::new()),
            }),
            dispatcher,
        }
    }

    /// Replace the listener notified after each state change.
    pub fn on_update<F>(&self, listener: F)
    where
        F: Fn(&PagingSnapshot<T>) + Send + Sync + 'static,
    {
        self.shared.state.lock().listener = Some(Arc::new(listener));
    }

    pub fn snapshot(&self) -> PagingSnapshot<T> {
        self.shared.state.lock().snapshot()
    }

    pub fn items(&self) -> Vec<T> {
        self.shared.state.lock().list.items().to_vec()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().list.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().machine.phase()
    }

    pub fn current_page(&self) -> u32 {
        self.shared.state.lock().current_page
    }

    pub fn total_pages(&self) -> TotalPages {
        self.shared.state.lock().total_pages
    }

    pub fn last_error(&self) -> Option<DispatchError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Fetch page 1 unless the list already has items or a load is running.
    pub fn initial_load(&self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.list.is_empty() {
            trace!("initial load skipped: list already populated");
            return false;
        }
        if let Err(err) = state.machine.begin_initial() {
            trace!(error = %err, "initial load skipped");
            return false;
        }
        self.launch(state, Attempt::Initial, Phase::Loaded)
    }

    /// Fetch the next page when `current_item` is among the last
    /// [`LOAD_MORE_THRESHOLD`] items of a loaded list.
    pub fn load_more_if_needed(&self, current_item: &T) -> bool {
        let state = self.shared.state.lock();
        if state.machine.phase() != Phase::Loaded {
            trace!(phase = %state.machine.phase(), "load more skipped");
            return false;
        }
        let key = (self.shared.spec.id)(current_item);
        let Some(position) = state.list.position(&key) else {
            trace!("load more skipped: item is not part of the list");
            return false;
        };
        if position + LOAD_MORE_THRESHOLD < state.list.len() {
            return false;
        }
        self.begin_more(state)
    }

    /// Fetch the next page regardless of the visible item.
    pub fn load_more(&self) -> bool {
        let state = self.shared.state.lock();
        self.begin_more(state)
    }

    /// Repeat the attempt that left the list `Failed`.
    pub fn retry(&self) -> bool {
        let mut state = self.shared.state.lock();
        let Some((attempt, resume)) = state.failed else {
            trace!(phase = %state.machine.phase(), "retry skipped: nothing failed");
            return false;
        };
        if let Err(err) = state.machine.retry_into(attempt.loading_phase()) {
            trace!(error = %err, "retry skipped");
            return false;
        }
        self.launch(state, attempt, resume)
    }

    /// Re-fetch page 1 and replace the list with it once it arrives.
    pub fn refresh(&self) -> bool {
        let mut state = self.shared.state.lock();
        let resume = state.machine.phase();
        if let Err(err) = state.machine.begin_refresh() {
            trace!(error = %err, "refresh skipped");
            return false;
        }
        self.launch(state, Attempt::Refresh, resume)
    }

    /// Re-fetch an already loaded page and merge it in place.
    pub fn reload_page(&self, page: u32) -> bool {
        let mut state = self.shared.state.lock();
        if page == 0 || page > state.current_page {
            trace!(
                page,
                current_page = state.current_page,
                "reload skipped: page not loaded"
            );
            return false;
        }
        let resume = state.machine.phase();
        if let Err(err) = state.machine.begin_reload() {
            trace!(error = %err, "reload skipped");
            return false;
        }
        self.launch(state, Attempt::Reload(page), resume)
    }

    fn begin_more(&self, mut state: MutexGuard<'_, PagingState<T, K>>) -> bool {
        if let Err(err) = state.machine.begin_more() {
            trace!(error = %err, "load more skipped");
            return false;
        }
        let page = state.current_page + 1;
        self.launch(state, Attempt::More(page), Phase::Loaded)
    }

    fn launch(
        &self,
        mut state: MutexGuard<'_, PagingState<T, K>>,
        attempt: Attempt,
        resume: Phase,
    ) -> bool {
        let ticket = state.track(attempt, resume);
        debug!(
            ticket,
            attempt = attempt.as_str(),
            page = attempt.page(),
            phase = %state.machine.phase(),
            "page fetch issued"
        );
        publish(state);

        let request = self.shared.spec.request_for(attempt.page());
        self.dispatcher.try_call_async_to(
            Arc::downgrade(&self.shared),
            request,
            DomainErrorPolicy::Surface,
            move |shared: Arc<Shared<R, T, K>>, result: Result<R, DispatchError>| {
                shared.complete(ticket, result);
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use logic_core::{
        ErrorCategory, ErrorMessage, ForegroundLoop, LogicContext, MockTransport, Response,
        Topic, TopicListRequest, TopicListResponse, TransportError,
    };
    use tokio::runtime::Handle;

    use super::*;

    type TopicSource = PagingSource<TopicListResponse, Topic, String>;

    fn topic(id: &str) -> Topic {
        Topic {
            id: id.into(),
            subject: format!("subject {id}"),
            ..Topic::default()
        }
    }

    fn topic_page(ids: &[&str], pages: u32) -> Result<Response, TransportError> {
        Ok(Response::TopicList(TopicListResponse {
            topics: ids.iter().map(|id| topic(id)).collect(),
            pages,
            error: None,
        }))
    }

    /// Page count 0 stands for "not reported".
    fn topic_spec(policy: FinishOnError) -> PageSpec<TopicListResponse, Topic, String> {
        PageSpec::new(
            |page| TopicListRequest {
                forum_id: "-7".into(),
                page,
            },
            |response: TopicListResponse| {
                let total = match response.pages {
                    0 => TotalPages::Unknown,
                    pages => TotalPages::Known(pages),
                };
                PageResult::new(response.topics, total)
            },
            |topic: &Topic| topic.id.clone(),
        )
        .finish_on_error(policy)
    }

    struct Harness {
        source: TopicSource,
        foreground: ForegroundLoop,
        transport: Arc<MockTransport>,
    }

    impl Harness {
        fn new<F>(policy: FinishOnError, pages: F) -> Self
        where
            F: Fn(u32) -> Result<Response, TransportError> + Send + Sync + 'static,
        {
            let transport = Arc::new(MockTransport::new(move |envelope| {
                pages(envelope.request.page().unwrap_or(0))
            }));
            let (foreground, handle) = ForegroundLoop::new();
            let dispatcher = Dispatcher::new(
                transport.clone(),
                LogicContext::default(),
                Handle::current(),
                handle,
            );
            Self {
                source: PagingSource::new(dispatcher, topic_spec(policy)),
                foreground,
                transport,
            }
        }

        async fn deliver(&mut self) {
            let ran = tokio::time::timeout(Duration::from_secs(2), self.foreground.run_next())
                .await
                .expect("delivery timeout");
            assert!(ran, "foreground loop closed unexpectedly");
        }

        fn ids(&self) -> Vec<String> {
            self.source
                .items()
                .into_iter()
                .map(|topic| topic.id)
                .collect()
        }
    }

    #[tokio::test]
    async fn merges_overlapping_pages_until_known_total() {
        let mut harness = Harness::new(FinishOnError::Disabled, |page| match page {
            1 => topic_page(&["a", "b", "c"], 2),
            2 => topic_page(&["c", "d"], 2),
            other => panic!("unexpected page {other}"),
        });

        assert!(harness.source.initial_load());
        harness.deliver().await;
        assert_eq!(harness.source.phase(), Phase::Loaded);
        assert_eq!(harness.source.current_page(), 1);

        assert!(harness.source.load_more_if_needed(&topic("c")));
        harness.deliver().await;

        assert_eq!(harness.ids(), vec!["a", "b", "c", "d"]);
        assert_eq!(harness.source.phase(), Phase::Exhausted);
        assert_eq!(harness.source.current_page(), 2);
        assert_eq!(harness.source.total_pages(), TotalPages::Known(2));

        assert!(!harness.source.load_more());
        assert!(!harness.source.load_more_if_needed(&topic("d")));
        assert_eq!(harness.transport.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_initial_loads_issue_one_call() {
        let mut harness = Harness::new(FinishOnError::Disabled, |_| topic_page(&["a"], 3));

        assert!(harness.source.initial_load());
        assert!(!harness.source.initial_load());
        assert_eq!(harness.source.phase(), Phase::LoadingInitial);
        assert!(!harness.source.load_more_if_needed(&topic("a")));
        harness.deliver().await;

        assert_eq!(harness.transport.calls(), 1);
        assert!(!harness.source.initial_load());
    }

    #[tokio::test]
    async fn empty_first_page_allows_another_initial_load() {
        let first_page_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_page_calls);
        let mut harness = Harness::new(FinishOnError::Disabled, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                topic_page(&[], 3)
            } else {
                topic_page(&["a", "b"], 3)
            }
        });

        assert!(harness.source.initial_load());
        harness.deliver().await;
        assert_eq!(harness.source.phase(), Phase::Loaded);
        assert!(harness.source.is_empty());

        assert!(harness.source.initial_load());
        assert_eq!(harness.source.phase(), Phase::LoadingInitial);
        harness.deliver().await;

        assert_eq!(harness.ids(), vec!["a", "b"]);
        assert_eq!(harness.source.current_page(), 1);
        assert_eq!(harness.transport.calls(), 2);
        assert!(!harness.source.initial_load());
    }

    #[tokio::test]
    async fn exhausted_empty_list_allows_another_initial_load() {
        let mut harness = Harness::new(FinishOnError::OnEmptyPage, |_| topic_page(&[], 0));

        harness.source.initial_load();
        harness.deliver().await;
        assert_eq!(harness.source.phase(), Phase::Exhausted);

        assert!(harness.source.initial_load());
        harness.deliver().await;
        assert_eq!(harness.transport.calls(), 2);
    }

    #[tokio::test]
    async fn load_more_if_needed_waits_for_loaded_phase() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failed = Arc::clone(&failures);
        let mut harness = Harness::new(FinishOnError::Disabled, move |page| match page {
            1 => topic_page(&["a", "b"], 3),
            _ if failed.fetch_add(1, Ordering::SeqCst) == 0 => Err(TransportError::Closed),
            _ => topic_page(&["c"], 3),
        });

        assert_eq!(harness.source.phase(), Phase::Idle);
        assert!(!harness.source.load_more_if_needed(&topic("a")));
        assert_eq!(harness.transport.calls(), 0);

        harness.source.initial_load();
        harness.deliver().await;
        assert!(harness.source.load_more_if_needed(&topic("b")));
        assert_eq!(harness.source.phase(), Phase::LoadingMore);
        assert!(!harness.source.load_more_if_needed(&topic("b")));
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Failed);
        assert!(!harness.source.load_more_if_needed(&topic("b")));
        assert_eq!(harness.transport.calls(), 2);
    }

    #[tokio::test]
    async fn only_items_near_the_end_trigger_load_more() {
        let ids = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        let mut harness = Harness::new(FinishOnError::Disabled, move |page| match page {
            1 => topic_page(&ids, 5),
            _ => topic_page(&["10"], 5),
        });
        harness.source.initial_load();
        harness.deliver().await;

        assert!(!harness.source.load_more_if_needed(&topic("2")));
        assert!(!harness.source.load_more_if_needed(&topic("6")));
        assert!(!harness.source.load_more_if_needed(&topic("unknown")));
        assert!(harness.source.load_more_if_needed(&topic("7")));
        assert_eq!(harness.source.phase(), Phase::LoadingMore);
        harness.deliver().await;

        assert_eq!(harness.source.len(), 11);
        assert_eq!(harness.transport.calls(), 2);
    }

    #[tokio::test]
    async fn empty_page_exhausts_with_finish_policy() {
        let mut harness = Harness::new(FinishOnError::OnEmptyPage, |page| match page {
            1 => topic_page(&["a", "b"], 0),
            _ => topic_page(&[], 0),
        });
        harness.source.initial_load();
        harness.deliver().await;
        assert_eq!(harness.source.phase(), Phase::Loaded);

        harness.source.load_more();
        harness.deliver().await;

        assert_eq!(harness.ids(), vec!["a", "b"]);
        assert_eq!(harness.source.phase(), Phase::Exhausted);
        assert_eq!(harness.source.last_error(), None);
    }

    #[tokio::test]
    async fn page_of_known_items_counts_as_empty() {
        let mut harness = Harness::new(FinishOnError::OnEmptyPage, |page| match page {
            1 => topic_page(&["a", "b"], 0),
            _ => topic_page(&["b"], 0),
        });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Exhausted);
        assert_eq!(harness.source.current_page(), 2);
    }

    #[tokio::test]
    async fn empty_page_without_policy_stays_loaded() {
        let mut harness = Harness::new(FinishOnError::Disabled, |page| match page {
            1 => topic_page(&["a"], 0),
            _ => topic_page(&[], 0),
        });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Loaded);
        assert_eq!(harness.source.current_page(), 2);
    }

    #[tokio::test]
    async fn initial_failure_then_retry_loads() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut harness = Harness::new(FinishOnError::Disabled, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Connection("unreachable".into()))
            } else {
                topic_page(&["a", "b"], 3)
            }
        });

        harness.source.initial_load();
        harness.deliver().await;
        assert!(harness.source.is_empty());
        assert_eq!(harness.source.phase(), Phase::Failed);
        let error = harness.source.last_error().expect("failure recorded");
        assert_eq!(error.code(), "transport_connection");
        assert!(!harness.source.load_more());
        assert!(!harness.source.load_more_if_needed(&topic("a")));

        assert!(harness.source.retry());
        assert_eq!(harness.source.phase(), Phase::LoadingInitial);
        harness.deliver().await;

        assert_eq!(harness.ids(), vec!["a", "b"]);
        assert_eq!(harness.source.phase(), Phase::Loaded);
        assert_eq!(harness.source.last_error(), None);
        assert!(!harness.source.retry());
    }

    #[tokio::test]
    async fn trailing_error_exhausts_with_finish_policy() {
        let mut harness =
            Harness::new(FinishOnError::OnEmptyPageOrTrailingError, |page| match page {
                1 => topic_page(&["a", "b"], 3),
                _ => Err(TransportError::Timeout(10_000)),
            });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Exhausted);
        assert_eq!(harness.source.last_error(), None);
        assert_eq!(harness.source.current_page(), 1);
        assert_eq!(harness.ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn retry_repeats_the_failed_page() {
        let requested = Arc::new(StdMutex::new(Vec::new()));
        let failures = Arc::new(AtomicUsize::new(0));
        let log = Arc::clone(&requested);
        let failed = Arc::clone(&failures);
        let mut harness = Harness::new(FinishOnError::Disabled, move |page| {
            log.lock().expect("lock").push(page);
            match page {
                1 => topic_page(&["a", "b"], 3),
                2 if failed.fetch_add(1, Ordering::SeqCst) == 0 => Err(TransportError::Closed),
                _ => topic_page(&["c"], 3),
            }
        });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Failed);
        assert_eq!(harness.source.current_page(), 1);
        assert!(harness.source.retry());
        assert_eq!(harness.source.phase(), Phase::LoadingMore);
        harness.deliver().await;

        assert_eq!(*requested.lock().expect("lock"), vec![1, 2, 2]);
        assert_eq!(harness.ids(), vec!["a", "b", "c"]);
        assert_eq!(harness.source.current_page(), 2);
        assert_eq!(harness.source.phase(), Phase::Loaded);
    }

    #[tokio::test]
    async fn reload_page_merges_in_place_and_keeps_current_page() {
        let first_page_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_page_calls);
        let mut harness = Harness::new(FinishOnError::Disabled, move |page| match page {
            1 => {
                let revision = counter.fetch_add(1, Ordering::SeqCst);
                let mut topics = vec![topic("a"), topic("b")];
                topics[0].subject = format!("rev {revision}");
                Ok(Response::TopicList(TopicListResponse {
                    topics,
                    pages: 3,
                    error: None,
                }))
            }
            _ => topic_page(&["c"], 3),
        });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;

        assert!(!harness.source.reload_page(3));
        assert!(!harness.source.reload_page(0));
        assert!(harness.source.reload_page(1));
        assert!(!harness.source.load_more());
        harness.deliver().await;

        let items = harness.source.items();
        assert_eq!(harness.ids(), vec!["a", "b", "c"]);
        assert_eq!(items[0].subject, "rev 1");
        assert_eq!(harness.source.current_page(), 2);
        assert_eq!(harness.source.phase(), Phase::Loaded);
    }

    #[tokio::test]
    async fn refresh_replaces_items_on_success() {
        let first_page_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_page_calls);
        let mut harness = Harness::new(FinishOnError::Disabled, move |page| match page {
            1 if counter.fetch_add(1, Ordering::SeqCst) == 0 => topic_page(&["a", "b", "c"], 2),
            1 => topic_page(&["x", "a"], 2),
            _ => topic_page(&["d"], 2),
        });
        harness.source.initial_load();
        harness.deliver().await;
        harness.source.load_more();
        harness.deliver().await;
        assert_eq!(harness.source.phase(), Phase::Exhausted);

        assert!(harness.source.refresh());
        assert_eq!(harness.ids(), vec!["a", "b", "c", "d"]);
        harness.deliver().await;

        assert_eq!(harness.ids(), vec!["x", "a"]);
        assert_eq!(harness.source.current_page(), 1);
        assert_eq!(harness.source.phase(), Phase::Loaded);
    }

    #[tokio::test]
    async fn domain_error_fails_the_list() {
        let mut harness = Harness::new(FinishOnError::OnEmptyPage, |_| {
            Ok(Response::TopicList(TopicListResponse {
                topics: Vec::new(),
                pages: 0,
                error: Some(ErrorMessage::new("1", "版面不存在")),
            }))
        });
        harness.source.initial_load();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Failed);
        let error = harness.source.last_error().expect("domain error kept");
        assert_eq!(error.category(), ErrorCategory::Domain);
    }

    #[tokio::test]
    async fn success_message_counts_as_an_empty_result() {
        let mut harness = Harness::new(FinishOnError::Disabled, |_| {
            Ok(Response::TopicList(TopicListResponse {
                topics: Vec::new(),
                pages: 1,
                error: Some(ErrorMessage::new("0", "没有符合条件的结果")),
            }))
        });
        harness.source.initial_load();
        harness.deliver().await;

        assert_eq!(harness.source.phase(), Phase::Exhausted);
        assert!(harness.source.is_empty());
        assert_eq!(harness.source.last_error(), None);
    }

    #[tokio::test]
    async fn dropped_source_ignores_late_delivery() {
        let Harness {
            source,
            mut foreground,
            ..
        } = Harness::new(FinishOnError::Disabled, |_| topic_page(&["a"], 1));
        let listened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&listened);
        source.on_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        source.initial_load();
        let state = Arc::downgrade(&source.shared);
        drop(source);
        assert!(state.upgrade().is_none());

        let ran = tokio::time::timeout(Duration::from_secs(2), foreground.run_next())
            .await
            .expect("delivery timeout");
        assert!(ran);
        assert_eq!(listened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_sees_every_transition() {
        let mut harness = Harness::new(FinishOnError::Disabled, |_| topic_page(&["a"], 1));
        let phases = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        harness.source.on_update(move |snapshot| {
            sink.lock()
                .expect("lock")
                .push((snapshot.phase, snapshot.items.len()));
        });

        harness.source.initial_load();
        harness.deliver().await;

        assert_eq!(
            *phases.lock().expect("lock"),
            vec![(Phase::LoadingInitial, 0), (Phase::Exhausted, 1)]
        );
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let mut harness = Harness::new(FinishOnError::Disabled, |_| topic_page(&["a"], 2));
        harness.source.initial_load();

        harness.source.shared.complete(
            99,
            Ok(TopicListResponse {
                topics: vec![topic("stale")],
                pages: 1,
                error: None,
            }),
        );
        assert!(harness.source.is_empty());
        assert_eq!(harness.source.phase(), Phase::LoadingInitial);

        harness.deliver().await;
        assert_eq!(harness.ids(), vec!["a"]);
        assert_eq!(harness.source.phase(), Phase::Loaded);
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let mut harness = Harness::new(FinishOnError::Disabled, |_| topic_page(&["a", "b"], 4));
        assert_eq!(
            harness.source.snapshot(),
            PagingSnapshot {
                items: Vec::new(),
                current_page: 0,
                total_pages: TotalPages::Unknown,
                phase: Phase::Idle,
                last_error: None,
            }
        );

        harness.source.initial_load();
        harness.deliver().await;
        let snapshot = harness.source.snapshot();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.current_page, 1);
        assert_eq!(snapshot.total_pages, TotalPages::Known(4));
        assert_eq!(snapshot.phase, Phase::Loaded);
    }
}
