//! Background data acquisition for pages.
//!
//! A page's synchronizers run on named threads bound to the [`PageContext`]
//! of one activation. They either poll a request-bound API call on a fixed
//! interval ([`run_poll`]) or consume a push stream ([`StreamSubscription`]).
//! Results go into the page's [`SnapshotStore`] and the view is refreshed by
//! submitting a mutation. Every write and every submission re-checks the
//! activation's cancellation handle, so a late result from a closed page is
//! dropped instead of resurrecting stale UI state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::api::ApiError;
use crate::cancel::CancelToken;
use crate::constants::{CLOSE_SETTLE, GROUP_TEST_SETTLE, POLL_INTERVAL, STREAM_BACKOFF};
use crate::queue::MutationSender;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Synchronizer timings. Tests shrink these to keep runs short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    pub poll_interval: Duration,
    pub stream_backoff: Duration,
    /// Wait after a group delay test before refetching providers
    pub group_test_settle: Duration,
    /// Wait after closing a connection before refetching the list
    pub close_settle: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            stream_backoff: STREAM_BACKOFF,
            group_test_settle: GROUP_TEST_SETTLE,
            close_settle: CLOSE_SETTLE,
        }
    }
}

impl SyncTiming {
    /// Uniformly short timings for tests
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            stream_backoff: Duration::from_millis(50),
            group_test_settle: Duration::from_millis(10),
            close_settle: Duration::from_millis(10),
        }
    }
}

/// Everything a background task of one page activation needs.
///
/// Captured by value when a task starts. The token belongs to exactly one
/// activation; a reactivated page gets a new context with a new token.
pub struct PageContext<S> {
    page: &'static str,
    token: CancelToken,
    queue: MutationSender<S>,
    timing: SyncTiming,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    spawned: Arc<AtomicU64>,
}

impl<S> Clone for PageContext<S> {
    fn clone(&self) -> Self {
        Self {
            page: self.page,
            token: self.token.clone(),
            queue: self.queue.clone(),
            timing: self.timing,
            tasks: Arc::clone(&self.tasks),
            spawned: Arc::clone(&self.spawned),
        }
    }
}

impl<S: 'static> PageContext<S> {
    pub fn new(page: &'static str, token: CancelToken, queue: MutationSender<S>, timing: SyncTiming) -> Self {
        Self {
            page,
            token,
            queue,
            timing,
            tasks: Arc::new(Mutex::new(Vec::new())),
            spawned: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn page(&self) -> &'static str {
        self.page
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    /// False once the owning activation has been deactivated
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Submit a view mutation bound to this activation.
    /// If the page is deactivated before the queue reaches it, it becomes a no-op.
    pub fn submit<F>(&self, mutation: F) -> bool
    where
        F: FnOnce(&mut S) -> Result<(), String> + Send + 'static,
    {
        if !self.is_live() {
            return false;
        }
        let token = self.token.clone();
        let page = self.page;
        self.queue.submit(page, move |state| {
            if token.is_cancelled() {
                log::debug!("{}: dropped mutation from a closed activation", page);
                return Ok(());
            }
            mutation(state)
        })
    }

    /// Run `task` on a named thread owned by this activation.
    pub fn spawn<F>(&self, task: &'static str, body: F) -> bool
    where
        F: FnOnce(PageContext<S>) + Send + 'static,
    {
        let ctx = self.clone();
        let spawned = thread::Builder::new().name(format!("{}-{}", self.page, task)).spawn(move || body(ctx));
        match spawned {
            Ok(handle) => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
                self.reap(&mut tasks);
                tasks.push(handle);
                true
            }
            Err(e) => {
                log::warn!("{}: failed to spawn {} thread: {}", self.page, task, e);
                false
            }
        }
    }

    /// Threads spawned through this context, finished or not
    pub fn spawned_count(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Threads of this activation that have not returned yet.
    /// Finished threads are joined on the way.
    pub fn running_count(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        self.reap(&mut tasks);
        tasks.len()
    }

    /// Join every finished handle in `tasks`, keeping the running ones.
    fn reap(&self, tasks: &mut Vec<JoinHandle<()>>) {
        let (finished, running): (Vec<_>, Vec<_>) = tasks.drain(..).partition(|h| h.is_finished());
        *tasks = running;
        for handle in finished {
            if handle.join().is_err() {
                log::warn!("{}: background thread panicked", self.page);
            }
        }
    }

    /// One fetch in the background, delivered through `hooks`.
    pub fn spawn_fetch<T, F>(&self, task: &'static str, store: SnapshotStore<T>, fetch: F, hooks: ViewHooks<S, T>) -> bool
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    {
        self.spawn(task, move |ctx| {
            let result = fetch();
            deliver(&ctx, &store, result, hooks);
        })
    }

    /// Poll `fetch` every `poll_interval` until deactivated.
    pub fn spawn_poll<T, F>(&self, task: &'static str, store: SnapshotStore<T>, fetch: F, hooks: ViewHooks<S, T>) -> bool
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Result<T, ApiError> + Send + 'static,
    {
        self.spawn(task, move |ctx| {
            let interval = ctx.timing.poll_interval;
            run_poll(&ctx, interval, fetch, |ctx, result| {
                deliver(ctx, &store, result, hooks);
            });
        })
    }
}

/// View callbacks for a synchronizer: what to do with fresh data or a failure.
pub struct ViewHooks<S, T> {
    pub on_data: fn(&mut S, Snapshot<T>),
    pub on_error: fn(&mut S, String),
}

impl<S, T> Clone for ViewHooks<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for ViewHooks<S, T> {}

/// Store a fetch result and submit the matching view mutation.
/// Returns false when the result was dropped because the page closed.
pub fn deliver<S, T>(ctx: &PageContext<S>, store: &SnapshotStore<T>, result: Result<T, ApiError>, hooks: ViewHooks<S, T>) -> bool
where
    S: 'static,
    T: Send + Sync + 'static,
{
    match result {
        Ok(data) => match store.write_live(ctx.token(), data) {
            Some(snapshot) => ctx.submit(move |state| {
                (hooks.on_data)(state, snapshot);
                Ok(())
            }),
            None => {
                log::debug!("{}: discarded late result", ctx.page());
                false
            }
        },
        Err(ApiError::Cancelled) => false,
        Err(e) => {
            if !ctx.is_live() {
                log::debug!("{}: discarded late error: {}", ctx.page(), e);
                return false;
            }
            log::warn!("{}: refresh failed: {}", ctx.page(), e);
            let message = e.to_string();
            ctx.submit(move |state| {
                (hooks.on_error)(state, message);
                Ok(())
            })
        }
    }
}

/// Poll loop: fetch immediately, then once per `interval`, until cancelled.
/// A failed fetch is handed to `deliver` like a successful one; the interval
/// alone rate-limits retries.
pub fn run_poll<S, T, F, D>(ctx: &PageContext<S>, interval: Duration, mut fetch: F, mut deliver: D)
where
    S: 'static,
    F: FnMut() -> Result<T, ApiError>,
    D: FnMut(&PageContext<S>, Result<T, ApiError>),
{
    loop {
        if !ctx.is_live() {
            return;
        }
        let result = fetch();
        if !ctx.is_live() {
            log::debug!("{}: poll result arrived after deactivation", ctx.page());
            return;
        }
        deliver(ctx, result);
        if ctx.token().wait_timeout(interval) {
            return;
        }
    }
}

/// A running consumption loop for one push feed.
pub struct StreamSubscription {
    name: &'static str,
    token: CancelToken,
    backoff: Duration,
    last_error: Arc<Mutex<Option<String>>>,
    attempts: Arc<AtomicU64>,
}

impl StreamSubscription {
    pub fn new(name: &'static str, token: CancelToken, backoff: Duration) -> Self {
        Self {
            name,
            token,
            backoff,
            last_error: Arc::new(Mutex::new(None)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscription bound to the activation behind `ctx`, with its stream backoff
    pub fn for_page<S: 'static>(name: &'static str, ctx: &PageContext<S>) -> Self {
        Self::new(name, ctx.token().clone(), ctx.timing().stream_backoff)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Times the stream has been opened
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Open the stream, and reopen it after `backoff` whenever it ends,
    /// until the token is cancelled.
    ///
    /// `open` blocks for the lifetime of one connection and must return
    /// `Err(ApiError::Cancelled)` once the token fires. `on_disconnect` runs
    /// once per lost connection, before the backoff wait.
    pub fn run<O, D>(&self, mut open: O, mut on_disconnect: D)
    where
        O: FnMut(&CancelToken) -> Result<(), ApiError>,
        D: FnMut(&ApiError),
    {
        loop {
            if self.token.is_cancelled() {
                return;
            }
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let err = match open(&self.token) {
                Err(ApiError::Cancelled) => return,
                Ok(()) => ApiError::StreamRead("stream closed by server".to_string()),
                Err(e) => e,
            };
            if self.token.is_cancelled() {
                return;
            }
            log::warn!("{} stream disconnected: {} (retrying in {:?})", self.name, err, self.backoff);
            *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
            on_disconnect(&err);
            if self.token.wait_timeout(self.backoff) {
                return;
            }
        }
    }
}
