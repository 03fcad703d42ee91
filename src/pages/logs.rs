//! Core log stream, kept in a bounded ring.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ht_base::api::ControlApi;
use ht_base::constants::LOG_RING_LINES;
use ht_base::lifecycle::Page;
use ht_base::models::LogEvent;
use ht_base::queue::Mutation;
use ht_base::snapshot::{Snapshot, SnapshotStore};
use ht_base::sync::{PageContext, StreamSubscription};

use super::PageId;
use crate::app::actions::Action;
use crate::state::UiState;

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub time: DateTime<Local>,
    pub level: String,
    pub payload: String,
}

impl LogLine {
    fn new(level: &str, payload: impl Into<String>) -> Self {
        Self { time: Local::now(), level: level.to_string(), payload: payload.into() }
    }
}

/// Lines per sealed chunk of a [`LogRing`]
const CHUNK_LINES: usize = 64;

/// Bounded log buffer built from shared, immutable chunks.
///
/// Every stream event publishes a fresh copy of the ring. A copy shares the
/// sealed chunks and only duplicates the open tail, so its cost stays at a
/// few dozen pointer clones however full the ring is.
#[derive(Debug, Clone, Default)]
pub struct LogRing {
    sealed: VecDeque<Arc<[Arc<LogLine>]>>,
    /// Lines of the front chunk already dropped
    skip: usize,
    tail: Vec<Arc<LogLine>>,
    len: usize,
}

impl LogRing {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `line`, dropping the oldest lines past `LOG_RING_LINES`.
    pub fn push(&mut self, line: LogLine) {
        self.tail.push(Arc::new(line));
        self.len += 1;
        if self.tail.len() == CHUNK_LINES {
            let chunk: Arc<[Arc<LogLine>]> = std::mem::take(&mut self.tail).into();
            self.sealed.push_back(chunk);
        }
        while self.len > LOG_RING_LINES {
            self.drop_oldest();
        }
    }

    fn drop_oldest(&mut self) {
        match self.sealed.front() {
            Some(front) => {
                self.skip += 1;
                if self.skip == front.len() {
                    self.sealed.pop_front();
                    self.skip = 0;
                }
            }
            None => {
                self.tail.remove(0);
            }
        }
        self.len -= 1;
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.sealed
            .iter()
            .enumerate()
            .flat_map(move |(i, chunk)| chunk[if i == 0 { self.skip } else { 0 }..].iter())
            .chain(self.tail.iter())
            .map(|line| line.as_ref())
    }

    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = &LogLine> {
        self.iter().skip(range.start).take(range.end.saturating_sub(range.start))
    }

    pub fn get(&self, index: usize) -> Option<&LogLine> {
        self.iter().nth(index)
    }
}

/// Copy of `ring` with `line` appended
fn append(ring: Option<&LogRing>, line: LogLine) -> LogRing {
    let mut next = ring.cloned().unwrap_or_default();
    next.push(line);
    next
}

#[derive(Debug, Clone, Default)]
pub struct LogsView {
    pub lines: Arc<LogRing>,
    /// Lines scrolled up from the newest; 0 follows the tail
    pub scroll: usize,
}

impl LogsView {
    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.lines.len().saturating_sub(1) as isize;
        self.scroll = (self.scroll as isize).saturating_add(delta).clamp(0, max.max(0)) as usize;
    }
}

fn show_ring(state: &mut UiState, snap: Snapshot<LogRing>) {
    let view = &mut state.logs;
    // Keep the viewport on the same lines while scrolled back
    if view.scroll > 0 {
        let added = snap.data.len().saturating_sub(view.lines.len());
        view.scroll = (view.scroll + added).min(snap.data.len().saturating_sub(1));
    }
    view.lines = snap.data;
}

#[derive(Clone)]
pub struct LogsPage {
    api: Arc<dyn ControlApi>,
    ring: SnapshotStore<LogRing>,
}

impl LogsPage {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self { api, ring: SnapshotStore::new() }
    }

    fn push(&self, ctx: &PageContext<UiState>, line: LogLine) {
        if let Some(snap) = self.ring.update_live(ctx.token(), |ring| append(ring, line)) {
            ctx.submit(move |state| {
                show_ring(state, snap);
                Ok(())
            });
        }
    }

    fn stream_logs(&self, ctx: &PageContext<UiState>) {
        let sub = StreamSubscription::for_page("logs", ctx);
        sub.run(
            |token| {
                self.api.stream_logs(token, &mut |event: LogEvent| {
                    self.push(ctx, LogLine::new(&event.level, event.payload));
                })
            },
            |e| self.push(ctx, LogLine::new("error", format!("Log stream disconnected: {}", e))),
        );
    }
}

impl Page<UiState> for LogsPage {
    fn id(&self) -> &'static str {
        PageId::Logs.id()
    }

    fn start(&self, ctx: &PageContext<UiState>) {
        self.push(ctx, LogLine::new("info", "Log stream started"));
        let page = self.clone();
        ctx.spawn("stream", move |ctx| page.stream_logs(&ctx));
    }

    fn activated_view(&self) -> Option<Mutation<UiState>> {
        Some(Box::new(|state: &mut UiState| {
            state.logs = LogsView::default();
            Ok(())
        }))
    }

    fn on_deactivated(&self, state: &mut UiState) {
        self.ring.clear();
        state.logs = LogsView::default();
    }
}

pub fn handle_key(key: &KeyEvent, _state: &UiState) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Up => Some(Action::CursorUp),
        KeyCode::Down => Some(Action::CursorDown),
        KeyCode::Home => Some(Action::CursorTop),
        KeyCode::End => Some(Action::CursorBottom),
        _ => None,
    }
}
