//! Request lifecycle notifications.
//!
//! Each [`NetworkService`](crate::NetworkService) owns a list of
//! [`NetworkObserver`]s. Observers are called synchronously, once when a
//! request is submitted and once when its response (or transport failure) is
//! received. Event payloads borrow the request and response, so observers
//! cannot retain them past delivery without cloning.

use crate::error::NetworkError;
use crate::response::HttpResponse;
use crate::route::RequestDescriptor;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Published before a request is handed to the transport.
#[derive(Debug, Clone, Copy)]
pub struct RequestEvent<'a> {
    /// The request being sent.
    pub request: &'a RequestDescriptor,
}

/// Published when a request completes at the transport level.
#[derive(Debug, Clone, Copy)]
pub struct ResponseEvent<'a> {
    /// The request that was sent.
    pub request: &'a RequestDescriptor,

    /// The received response, if one arrived.
    pub response: Option<&'a HttpResponse>,

    /// The transport or validation failure, if the request failed.
    pub error: Option<&'a NetworkError>,

    /// Time from submission to completion.
    pub duration: Duration,
}

/// Receives request lifecycle events from a [`NetworkService`](crate::NetworkService).
///
/// # Examples
///
/// ```
/// use courier::{NetworkObserver, ResponseEvent};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// impl NetworkObserver for FailureCounter {
///     fn did_receive(&self, event: &ResponseEvent<'_>) {
///         if event.error.is_some() {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait NetworkObserver: Send + Sync {
    /// Called before the request is sent.
    fn did_request(&self, _event: &RequestEvent<'_>) {}

    /// Called when the response has been received and validated, or the
    /// request failed at the transport level.
    fn did_receive(&self, _event: &ResponseEvent<'_>) {}
}

/// Identifies a registered observer so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct ObserverList {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ObserverId, Arc<dyn NetworkObserver>)>>,
}

/// The observer list owned by a service.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    inner: Arc<ObserverList>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn NetworkObserver>) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.entries.write().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub(crate) fn downgrade(&self) -> WeakObservers {
        WeakObservers(Arc::downgrade(&self.inner))
    }

    pub(crate) fn notify_request(&self, event: &RequestEvent<'_>) {
        for observer in self.snapshot() {
            observer.did_request(event);
        }
    }

    pub(crate) fn notify_response(&self, event: &ResponseEvent<'_>) {
        for observer in self.snapshot() {
            observer.did_receive(event);
        }
    }

    // Observers run outside the lock so they may add or remove observers.
    fn snapshot(&self) -> Vec<Arc<dyn NetworkObserver>> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

/// A non-owning handle to a service's observer list.
#[derive(Clone)]
pub(crate) struct WeakObservers(Weak<ObserverList>);

impl WeakObservers {
    pub(crate) fn upgrade(&self) -> Option<Observers> {
        self.0.upgrade().map(|inner| Observers { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        requests: AtomicUsize,
        responses: AtomicUsize,
    }

    impl NetworkObserver for Counter {
        fn did_request(&self, _event: &RequestEvent<'_>) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }

        fn did_receive(&self, _event: &ResponseEvent<'_>) {
            self.responses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request() -> RequestDescriptor {
        RequestDescriptor::new(Method::GET, url::Url::parse("https://example.com").unwrap())
    }

    #[test]
    fn test_add_notify_remove() {
        let observers = Observers::default();
        let counter = Arc::new(Counter::default());
        let id = observers.add(counter.clone());

        let request = request();
        observers.notify_request(&RequestEvent { request: &request });
        observers.notify_response(&ResponseEvent {
            request: &request,
            response: None,
            error: None,
            duration: Duration::ZERO,
        });

        assert_eq!(counter.requests.load(Ordering::SeqCst), 1);
        assert_eq!(counter.responses.load(Ordering::SeqCst), 1);

        assert!(observers.remove(id));
        assert!(!observers.remove(id));
        observers.notify_request(&RequestEvent { request: &request });
        assert_eq!(counter.requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let observers = Observers::default();
        let first = observers.add(Arc::new(Counter::default()));
        let second = observers.add(Arc::new(Counter::default()));

        assert_ne!(first, second);
        assert_eq!(observers.len(), 2);
        observers.remove(first);
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn test_weak_handle_does_not_keep_list_alive() {
        let observers = Observers::default();
        let weak = observers.downgrade();
        assert!(weak.upgrade().is_some());

        drop(observers);
        assert!(weak.upgrade().is_none());
    }
}
