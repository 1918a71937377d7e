//! Observer fan-out on a single notification thread

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send>;

/// Runs notification jobs one at a time, in submission order, on a
/// dedicated thread.
///
/// The thread exits once every handle has been dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl NotificationDispatcher {
    pub fn spawn(thread_name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
                debug!("Notification dispatcher exiting");
            })?;

        Ok(Self { tx })
    }

    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            warn!("Notification dispatcher is gone, dropping notification");
        }
    }

    /// Wait until every job queued before this call has run
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }
}

/// Identity-keyed set of observers.
///
/// Subscribing the same `Arc` twice keeps one entry. Each notification is
/// delivered to the subscribers present when it was raised, as one batch.
pub struct ObserverRegistry<T: ?Sized> {
    observers: RwLock<Vec<Arc<T>>>,
    dispatcher: NotificationDispatcher,
}

impl<T: ?Sized + Send + Sync + 'static> ObserverRegistry<T> {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            dispatcher,
        }
    }

    /// Returns false if the observer was already subscribed
    pub fn subscribe(&self, observer: Arc<T>) -> bool {
        let mut observers = self.observers.write();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Returns false if the observer was not subscribed
    pub fn unsubscribe(&self, observer: &Arc<T>) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Deliver `notify` to every current subscriber on the notification thread
    pub fn notify_all(&self, event: &'static str, notify: impl Fn(&T) + Send + 'static) {
        let snapshot: Vec<Arc<T>> = self.observers.read().clone();
        if snapshot.is_empty() {
            debug!("No observers for {}", event);
            return;
        }

        self.dispatcher.dispatch(move || {
            for observer in &snapshot {
                let delivered = catch_unwind(AssertUnwindSafe(|| notify(observer.as_ref())));
                if delivered.is_err() {
                    warn!("Observer panicked while handling {}", event);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Listener: Send + Sync {
        fn on_event(&self, value: u32);
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u32, Option<String>)>>,
    }

    impl Listener for Recorder {
        fn on_event(&self, value: u32) {
            let thread = std::thread::current().name().map(str::to_string);
            self.seen.lock().push((value, thread));
        }
    }

    struct Panicker;

    impl Listener for Panicker {
        fn on_event(&self, _value: u32) {
            panic!("observer failure");
        }
    }

    fn registry() -> ObserverRegistry<dyn Listener> {
        ObserverRegistry::new(NotificationDispatcher::spawn("test-notifications").unwrap())
    }

    #[tokio::test]
    async fn test_delivery_runs_on_notification_thread() {
        let registry = registry();
        let recorder = Arc::new(Recorder::default());
        registry.subscribe(recorder.clone());

        registry.notify_all("event", |l| l.on_event(1));
        registry.dispatcher().flush().await;

        let seen = recorder.seen.lock().clone();
        assert_eq!(seen, vec![(1, Some("test-notifications".to_string()))]);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_collapses() {
        let registry = registry();
        let recorder = Arc::new(Recorder::default());
        let as_listener: Arc<dyn Listener> = recorder.clone();

        assert!(registry.subscribe(as_listener.clone()));
        assert!(!registry.subscribe(as_listener.clone()));
        assert_eq!(registry.len(), 1);

        registry.notify_all("event", |l| l.on_event(7));
        registry.dispatcher().flush().await;
        assert_eq!(recorder.seen.lock().len(), 1);

        assert!(registry.unsubscribe(&as_listener));
        assert!(!registry.unsubscribe(&as_listener));
        assert!(registry.is_empty());

        registry.notify_all("event", |l| l.on_event(8));
        registry.dispatcher().flush().await;
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_block_others() {
        let registry = registry();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        registry.subscribe(first.clone());
        registry.subscribe(Arc::new(Panicker));
        registry.subscribe(second.clone());

        registry.notify_all("event", |l| l.on_event(3));
        registry.notify_all("event", |l| l.on_event(4));
        registry.dispatcher().flush().await;

        let values = |r: &Recorder| r.seen.lock().iter().map(|(v, _)| *v).collect::<Vec<_>>();
        assert_eq!(values(&first), vec![3, 4]);
        assert_eq!(values(&second), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_snapshot_taken_at_notify_time() {
        let registry = registry();
        let early = Arc::new(Recorder::default());
        let late = Arc::new(Recorder::default());
        registry.subscribe(early.clone());

        registry.notify_all("event", |l| l.on_event(1));
        registry.subscribe(late.clone());
        registry.notify_all("event", |l| l.on_event(2));
        registry.dispatcher().flush().await;

        assert_eq!(early.seen.lock().len(), 2);
        let late_values: Vec<u32> = late.seen.lock().iter().map(|(v, _)| *v).collect();
        assert_eq!(late_values, vec![2]);
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_notify() {
        let registry = Arc::new(registry());
        let recorders: Vec<Arc<Recorder>> = (0..16).map(|_| Arc::new(Recorder::default())).collect();

        let handles: Vec<_> = recorders
            .iter()
            .cloned()
            .map(|r| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.subscribe(r);
                    registry.notify_all("event", |l| l.on_event(0));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        registry.notify_all("event", |l| l.on_event(99));
        registry.dispatcher().flush().await;

        assert_eq!(registry.len(), 16);
        for recorder in &recorders {
            let seen = recorder.seen.lock();
            assert_eq!(seen.iter().filter(|(v, _)| *v == 99).count(), 1);
        }
    }
}
