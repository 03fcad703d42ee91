//! Serialized mutation path for UI state.
//!
//! Background threads never touch UI state. They hand a closure to a
//! [`MutationSender`]; the thread that owns the [`MutationQueue`] (the event
//! loop) applies those closures one at a time, in submission order, with
//! exclusive `&mut` access to the state. Submission never blocks.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// A unit of UI work. An `Err` is logged and skipped; it never stops the queue.
pub type Mutation<S> = Box<dyn FnOnce(&mut S) -> Result<(), String> + Send>;

struct Envelope<S> {
    /// Who submitted the mutation, for log lines only
    origin: &'static str,
    mutation: Mutation<S>,
}

/// Cloneable submission handle. Hand one to every component that produces UI work.
pub struct MutationSender<S> {
    tx: Sender<Envelope<S>>,
}

impl<S> Clone for MutationSender<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<S> MutationSender<S> {
    /// Enqueue a mutation. Fire-and-forget: returns false only if the queue is gone.
    pub fn submit<F>(&self, origin: &'static str, mutation: F) -> bool
    where
        F: FnOnce(&mut S) -> Result<(), String> + Send + 'static,
    {
        self.tx.send(Envelope { origin, mutation: Box::new(mutation) }).is_ok()
    }
}

/// Receiving end, owned by the single thread allowed to mutate UI state.
pub struct MutationQueue<S> {
    tx: Sender<Envelope<S>>,
    rx: Receiver<Envelope<S>>,
    applied: u64,
    failed: u64,
}

impl<S> Default for MutationQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> MutationQueue<S> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, applied: 0, failed: 0 }
    }

    pub fn sender(&self) -> MutationSender<S> {
        MutationSender { tx: self.tx.clone() }
    }

    /// Apply everything queued so far without waiting.
    /// `on_applied` is the render callback, invoked once per applied mutation.
    /// Returns the number of mutations taken off the queue.
    pub fn apply_pending(&mut self, state: &mut S, mut on_applied: impl FnMut(&S)) -> usize {
        let mut count = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            self.apply_one(envelope, state, &mut on_applied);
            count += 1;
        }
        count
    }

    /// Block up to `timeout` for the first mutation, then drain the rest.
    /// Lets an otherwise idle loop sleep on the queue instead of spinning.
    pub fn apply_within(&mut self, state: &mut S, timeout: Duration, mut on_applied: impl FnMut(&S)) -> usize {
        let deadline = Instant::now() + timeout;
        let first = match self.rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
        };
        self.apply_one(first, state, &mut on_applied);
        1 + self.apply_pending(state, on_applied)
    }

    fn apply_one(&mut self, envelope: Envelope<S>, state: &mut S, on_applied: &mut impl FnMut(&S)) {
        match (envelope.mutation)(state) {
            Ok(()) => {
                self.applied += 1;
                on_applied(state);
            }
            Err(e) => {
                self.failed += 1;
                log::warn!("mutation from '{}' failed: {}", envelope.origin, e);
            }
        }
    }

    /// Mutations that completed successfully since creation
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    /// Mutations that returned an error and were skipped
    pub fn failed_count(&self) -> u64 {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn applies_in_submission_order() {
        let mut queue: MutationQueue<Vec<&'static str>> = MutationQueue::new();
        let tx = queue.sender();
        tx.submit("page", |log| {
            log.push("M1");
            Ok(())
        });
        tx.submit("page", |log| {
            log.push("M2");
            Ok(())
        });
        tx.submit("page", |log| {
            log.push("M3");
            Ok(())
        });

        let mut log = Vec::new();
        assert_eq!(queue.apply_pending(&mut log, |_| {}), 3);
        assert_eq!(log, vec!["M1", "M2", "M3"]);
    }

    #[test]
    fn order_holds_for_a_background_producer() {
        let mut queue: MutationQueue<Vec<usize>> = MutationQueue::new();
        let tx = queue.sender();
        let producer = thread::spawn(move || {
            for i in 0..100 {
                tx.submit("producer", move |log| {
                    log.push(i);
                    Ok(())
                });
            }
        });
        let _ = producer.join();

        let mut log = Vec::new();
        queue.apply_pending(&mut log, |_| {});
        assert_eq!(log, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn failing_mutation_is_skipped_and_queue_continues() {
        let mut queue: MutationQueue<Vec<u8>> = MutationQueue::new();
        let tx = queue.sender();
        tx.submit("a", |log| {
            log.push(1);
            Ok(())
        });
        tx.submit("b", |_| Err("boom".to_string()));
        tx.submit("c", |log| {
            log.push(3);
            Ok(())
        });

        let mut log = Vec::new();
        queue.apply_pending(&mut log, |_| {});
        assert_eq!(log, vec![1, 3]);
        assert_eq!(queue.applied_count(), 2);
        assert_eq!(queue.failed_count(), 1);
    }

    #[test]
    fn render_callback_runs_once_per_applied_mutation() {
        let mut queue: MutationQueue<u32> = MutationQueue::new();
        let tx = queue.sender();
        for _ in 0..4 {
            tx.submit("t", |n| {
                *n += 1;
                Ok(())
            });
        }
        tx.submit("t", |_| Err("skip".into()));

        let mut renders = Vec::new();
        let mut state = 0;
        queue.apply_pending(&mut state, |n| renders.push(*n));
        assert_eq!(renders, vec![1, 2, 3, 4]);
    }

    #[test]
    fn apply_within_waits_for_late_submission() {
        let mut queue: MutationQueue<u32> = MutationQueue::new();
        let tx = queue.sender();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.submit("late", |n| {
                *n = 7;
                Ok(())
            });
        });

        let mut state = 0;
        let applied = queue.apply_within(&mut state, Duration::from_secs(5), |_| {});
        let _ = producer.join();
        assert_eq!(applied, 1);
        assert_eq!(state, 7);
    }

    #[test]
    fn apply_within_returns_zero_on_timeout() {
        let mut queue: MutationQueue<u32> = MutationQueue::new();
        let mut state = 0;
        assert_eq!(queue.apply_within(&mut state, Duration::from_millis(10), |_| {}), 0);
    }
}
