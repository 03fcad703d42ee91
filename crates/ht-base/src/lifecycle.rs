//! Page lifecycle: Inactive ⇄ Active, one cancellation handle per activation.
//!
//! Pages are registered by id and looked up by id; the registry is the only
//! place that creates contexts, so two activations of one page can never be
//! outstanding at the same time.

use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::queue::{Mutation, MutationSender};
use crate::sync::{PageContext, SyncTiming};

/// One independently activatable view of the dashboard.
///
/// Fields written by background tasks live behind the page's snapshot store;
/// view fields live in `S` and are only touched inside mutations.
pub trait Page<S>: Send {
    fn id(&self) -> &'static str;

    /// Spawn the synchronizers for a new activation through `ctx`.
    /// Must also start the initial fetch; failures are reported as view mutations.
    fn start(&self, ctx: &PageContext<S>);

    /// Mutation rendering the page right after activation (loading state).
    fn activated_view(&self) -> Option<Mutation<S>> {
        None
    }

    /// Clear the snapshot store and reset page-held view state.
    /// Runs on the mutation thread after the activation's token was cancelled.
    fn on_deactivated(&self, state: &mut S);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Inactive,
    Active,
}

struct Entry<S> {
    page: Box<dyn Page<S>>,
    /// Context of the current activation, None while inactive
    active: Option<PageContext<S>>,
    activations: u64,
    /// Threads spawned by earlier activations
    spawned_before: u64,
}

/// Lifecycle controller for every registered page.
pub struct PageRegistry<S> {
    entries: Vec<Entry<S>>,
    queue: MutationSender<S>,
    timing: SyncTiming,
    /// Contexts of past activations whose threads may still be winding down
    retired: Vec<PageContext<S>>,
}

impl<S: 'static> PageRegistry<S> {
    pub fn new(queue: MutationSender<S>, timing: SyncTiming) -> Self {
        Self { entries: Vec::new(), queue, timing, retired: Vec::new() }
    }

    /// Register a page. A second page with the same id replaces the first.
    pub fn register(&mut self, page: Box<dyn Page<S>>) {
        let id = page.id();
        self.entries.retain(|e| e.page.id() != id);
        self.entries.push(Entry { page, active: None, activations: 0, spawned_before: 0 });
    }

    fn entry(&self, id: &str) -> Option<&Entry<S>> {
        self.entries.iter().find(|e| e.page.id() == id)
    }

    pub fn state(&self, id: &str) -> Option<PageState> {
        self.entry(id).map(|e| if e.active.is_some() { PageState::Active } else { PageState::Inactive })
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state(id) == Some(PageState::Active)
    }

    /// Activate `id`. Returns false for an unknown id or an already active page.
    pub fn activate(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.page.id() == id) else {
            log::warn!("activate: unknown page '{}'", id);
            return false;
        };
        if entry.active.is_some() {
            return false;
        }

        let ctx = PageContext::new(entry.page.id(), CancelToken::new(), self.queue.clone(), self.timing);
        entry.active = Some(ctx.clone());
        entry.activations += 1;
        log::info!("page '{}' activated (#{})", id, entry.activations);

        // Loading view goes first so data mutations always land after it
        if let Some(view) = entry.page.activated_view() {
            ctx.submit(move |state| view(state));
        }
        entry.page.start(&ctx);
        true
    }

    /// Deactivate `id`. Returns false for an unknown id or an inactive page.
    pub fn deactivate(&mut self, id: &str, state: &mut S) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.page.id() == id) else {
            return false;
        };
        let Some(ctx) = entry.active.take() else {
            return false;
        };

        ctx.token().cancel();
        entry.spawned_before += ctx.spawned_count();
        entry.page.on_deactivated(state);
        log::info!("page '{}' deactivated", id);
        self.retired.retain(|c| c.running_count() > 0);
        self.retired.push(ctx);
        true
    }

    /// Context of the current activation, for user commands bound to it.
    pub fn context(&self, id: &str) -> Option<PageContext<S>> {
        self.entry(id).and_then(|e| e.active.clone())
    }

    /// Number of times `id` has been activated
    pub fn activation_count(&self, id: &str) -> u64 {
        self.entry(id).map(|e| e.activations).unwrap_or(0)
    }

    /// Background threads `id` has started across all activations
    pub fn tasks_started(&self, id: &str) -> u64 {
        self.entry(id)
            .map(|e| e.spawned_before + e.active.as_ref().map(|c| c.spawned_count()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Threads, active or retired, that have not returned yet
    pub fn outstanding_tasks(&mut self) -> usize {
        self.retired.retain(|ctx| ctx.running_count() > 0);
        let retired: usize = self.retired.iter().map(|ctx| ctx.running_count()).sum();
        let active: usize = self.entries.iter().filter_map(|e| e.active.as_ref()).map(|ctx| ctx.running_count()).sum();
        retired + active
    }

    /// Wait up to `grace` for every background thread to return.
    /// Returns true once none are outstanding.
    pub fn wait_idle(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.outstanding_tasks() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Deactivate every active page and give their threads `grace` to finish.
    pub fn shutdown(&mut self, state: &mut S, grace: Duration) -> bool {
        let active: Vec<&'static str> =
            self.entries.iter().filter(|e| e.active.is_some()).map(|e| e.page.id()).collect();
        for id in active {
            self.deactivate(id, state);
        }
        let idle = self.wait_idle(grace);
        if !idle {
            log::warn!("{} background thread(s) still running at shutdown", self.outstanding_tasks());
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MutationQueue;
    use crate::snapshot::SnapshotStore;
    use crate::sync::ViewHooks;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct View {
        loading: bool,
        rows: Vec<u32>,
        selected: Option<u32>,
    }

    /// A polling page whose fetch can be held back by a gate.
    struct CounterPage {
        store: SnapshotStore<Vec<u32>>,
        fetches: Arc<AtomicUsize>,
        gate: Arc<Mutex<()>>,
    }

    impl CounterPage {
        fn new() -> Self {
            Self {
                store: SnapshotStore::new(),
                fetches: Arc::new(AtomicUsize::new(0)),
                gate: Arc::new(Mutex::new(())),
            }
        }
    }

    impl Page<View> for CounterPage {
        fn id(&self) -> &'static str {
            "counter"
        }

        fn start(&self, ctx: &PageContext<View>) {
            let fetches = Arc::clone(&self.fetches);
            let gate = Arc::clone(&self.gate);
            ctx.spawn_poll(
                "poll",
                self.store.clone(),
                move || {
                    let _held = gate.lock().unwrap_or_else(|e| e.into_inner());
                    let n = fetches.fetch_add(1, Ordering::SeqCst) as u32;
                    Ok(vec![n])
                },
                ViewHooks {
                    on_data: |view, snap| {
                        view.loading = false;
                        view.rows = snap.data.as_ref().clone();
                    },
                    on_error: |view, _| view.loading = false,
                },
            );
        }

        fn activated_view(&self) -> Option<Mutation<View>> {
            Some(Box::new(|view: &mut View| {
                view.loading = true;
                view.rows.clear();
                Ok(())
            }))
        }

        fn on_deactivated(&self, view: &mut View) {
            self.store.clear();
            view.rows.clear();
            view.selected = None;
        }
    }

    fn registry_with(page: CounterPage) -> (MutationQueue<View>, PageRegistry<View>) {
        let queue = MutationQueue::new();
        let mut registry = PageRegistry::new(queue.sender(), SyncTiming::fast());
        registry.register(Box::new(page));
        (queue, registry)
    }

    #[test]
    fn activate_then_deactivate_leaves_no_tasks() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View::default();
        assert!(registry.activate("counter"));
        assert!(registry.deactivate("counter", &mut view));
        assert!(registry.wait_idle(Duration::from_secs(2)));
        assert_eq!(registry.outstanding_tasks(), 0);
    }

    #[test]
    fn double_activate_starts_tasks_once() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        assert!(registry.activate("counter"));
        assert!(!registry.activate("counter"));
        assert_eq!(registry.tasks_started("counter"), 1);
        assert_eq!(registry.activation_count("counter"), 1);

        let mut view = View::default();
        registry.shutdown(&mut view, Duration::from_secs(2));
    }

    #[test]
    fn page_switching_does_not_accumulate_retired_contexts() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View::default();
        for _ in 0..50 {
            registry.activate("counter");
            registry.deactivate("counter", &mut view);
        }
        // Let every cancelled poll thread return
        thread::sleep(Duration::from_millis(300));

        registry.activate("counter");
        registry.deactivate("counter", &mut view);
        assert_eq!(registry.retired.len(), 1);
        assert!(registry.wait_idle(Duration::from_secs(2)));
        assert!(registry.retired.is_empty());
    }

    #[test]
    fn finished_threads_are_joined() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        registry.activate("counter");
        let ctx = registry.context("counter").unwrap();
        for _ in 0..5 {
            ctx.spawn("once", |_| {});
        }
        let mut view = View::default();
        registry.deactivate("counter", &mut view);
        assert!(registry.wait_idle(Duration::from_secs(2)));
        assert_eq!(ctx.running_count(), 0);
        assert_eq!(ctx.spawned_count(), 6);
    }

    #[test]
    fn deactivate_when_inactive_is_noop() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View::default();
        assert!(!registry.deactivate("counter", &mut view));
        assert!(!registry.deactivate("missing", &mut view));
        assert!(!registry.activate("missing"));
    }

    #[test]
    fn late_response_after_deactivate_leaves_store_cleared() {
        let page = CounterPage::new();
        let store = page.store.clone();
        let fetches = Arc::clone(&page.fetches);
        let gate = Arc::clone(&page.gate);
        let (mut queue, mut registry) = registry_with(page);
        let mut view = View::default();

        // Hold the fetch until after deactivation
        let held = gate.lock().unwrap();
        registry.activate("counter");
        registry.deactivate("counter", &mut view);
        drop(held);

        assert!(registry.wait_idle(Duration::from_secs(2)));
        queue.apply_pending(&mut view, |_| {});
        assert!(store.is_empty());
        assert!(view.rows.is_empty());
        assert!(fetches.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn reactivation_uses_a_fresh_token() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View::default();
        registry.activate("counter");
        let first = registry.context("counter").map(|c| c.token().clone());
        registry.deactivate("counter", &mut view);
        registry.activate("counter");
        let second = registry.context("counter").map(|c| c.token().clone());

        assert!(first.as_ref().is_some_and(|t| t.is_cancelled()));
        assert!(second.as_ref().is_some_and(|t| !t.is_cancelled()));
        assert_eq!(registry.activation_count("counter"), 2);
        registry.shutdown(&mut view, Duration::from_secs(2));
    }

    #[test]
    fn activation_renders_loading_before_data() {
        let (mut queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View::default();
        let mut seen = Vec::new();
        registry.activate("counter");

        let deadline = Instant::now() + Duration::from_secs(2);
        while view.rows.is_empty() && Instant::now() < deadline {
            queue.apply_within(&mut view, Duration::from_millis(20), |v| seen.push(v.loading));
        }
        assert_eq!(seen.first(), Some(&true));
        assert!(!view.loading);
        registry.shutdown(&mut view, Duration::from_secs(2));
    }

    #[test]
    fn deactivate_resets_selection() {
        let (_queue, mut registry) = registry_with(CounterPage::new());
        let mut view = View { selected: Some(3), ..View::default() };
        registry.activate("counter");
        registry.deactivate("counter", &mut view);
        assert_eq!(view.selected, None);
        assert_eq!(registry.state("counter"), Some(PageState::Inactive));
    }
}
