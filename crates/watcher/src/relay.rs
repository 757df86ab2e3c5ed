//! Notification relay
//!
//! Module callbacks arrive on threads the host does not control. The relay
//! only enqueues; the presentation thread is the sole consumer of the queue
//! and the only place notifications are shown.

use crate::event::{ChangeEvent, Generation};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use module::ChangeCallback;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Displays notifications on the presentation thread
pub trait Presenter {
    fn show_notification(&mut self, title: &str, body: &str);
}

/// Producer side, safe to call from any thread
#[derive(Clone)]
pub struct NotificationRelay {
    tx: Sender<ChangeEvent>,
    generation: Generation,
}

/// Consumer side, owned by the presentation thread
pub struct PresentationQueue {
    rx: Receiver<ChangeEvent>,
    generation: Generation,
}

impl NotificationRelay {
    /// Create a connected relay and queue
    pub fn channel() -> (Self, PresentationQueue) {
        let (tx, rx) = unbounded();
        let generation = Generation::default();
        (
            Self {
                tx,
                generation: generation.clone(),
            },
            PresentationQueue { rx, generation },
        )
    }

    /// Counter to hand to the session manager
    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Entry point for module callbacks
    pub fn on_native_event(&self, path: PathBuf) {
        self.deliver(ChangeEvent::stamped(path, self.generation.current()));
    }

    /// Queue `event` for the presentation thread
    ///
    /// Once the queue is gone (shell shut down) events are dropped.
    pub fn deliver(&self, event: ChangeEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!("Presentation queue closed; dropping {}", e.0.path.display());
        }
    }

    /// Callback to register with the module binder
    ///
    /// Captures only the relay, never the module itself.
    pub fn callback(&self) -> ChangeCallback {
        let relay = self.clone();
        Arc::new(move |path: PathBuf| relay.on_native_event(path))
    }
}

impl PresentationQueue {
    /// Raw receiver, for `select!` loops
    pub fn receiver(&self) -> &Receiver<ChangeEvent> {
        &self.rx
    }

    pub fn try_next(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Whether `event` arrived during the current watch
    pub fn is_current(&self, event: &ChangeEvent) -> bool {
        event.generation >= self.generation.current()
    }

    /// Show one event; events from a stopped watch are marked as such
    pub fn present(&self, event: &ChangeEvent, presenter: &mut dyn Presenter) {
        let body = if self.is_current(event) {
            event.body()
        } else {
            event.stale_body()
        };
        presenter.show_notification(ChangeEvent::TITLE, &body);
    }

    /// Show every queued event in order. Returns how many were shown.
    pub fn drain_into(&self, presenter: &mut dyn Presenter) -> usize {
        let mut shown = 0;
        while let Some(event) = self.try_next() {
            self.present(&event, presenter);
            shown += 1;
        }
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<(String, String)>);

    impl Presenter for Collect {
        fn show_notification(&mut self, title: &str, body: &str) {
            self.0.push((title.to_string(), body.to_string()));
        }
    }

    #[test]
    fn test_single_event_is_presented_once() {
        let (relay, queue) = NotificationRelay::channel();
        relay.on_native_event(PathBuf::from("/tmp/watch/file.txt"));

        let mut shell = Collect::default();
        assert_eq!(queue.drain_into(&mut shell), 1);
        assert_eq!(queue.drain_into(&mut shell), 0);
        assert_eq!(
            shell.0,
            vec![(
                "File Change Detected".to_string(),
                "Change in: /tmp/watch/file.txt".to_string()
            )]
        );
    }

    #[test]
    fn test_duplicates_pass_through() {
        let (relay, queue) = NotificationRelay::channel();
        let callback = relay.callback();
        callback(PathBuf::from("a"));
        callback(PathBuf::from("a"));

        let mut shell = Collect::default();
        assert_eq!(queue.drain_into(&mut shell), 2);
    }

    #[test]
    fn test_drop_after_shutdown() {
        let (relay, queue) = NotificationRelay::channel();
        drop(queue);
        // Must not panic or error
        relay.on_native_event(PathBuf::from("late"));
    }

    #[test]
    fn test_events_from_previous_watch_are_marked() {
        let (relay, queue) = NotificationRelay::channel();
        relay.on_native_event(PathBuf::from("/old/a.txt"));
        relay.generation().advance();
        relay.on_native_event(PathBuf::from("/new/b.txt"));

        let mut shell = Collect::default();
        assert_eq!(queue.drain_into(&mut shell), 2);
        assert_eq!(shell.0[0].1, "Change in: /old/a.txt (previous watch)");
        assert_eq!(shell.0[1].1, "Change in: /new/b.txt");
    }

    #[test]
    fn test_recv_timeout_empty() {
        let (_relay, queue) = NotificationRelay::channel();
        assert!(queue.recv_timeout(Duration::from_millis(10)).is_none());
        assert!(queue.try_next().is_none());
    }
}
