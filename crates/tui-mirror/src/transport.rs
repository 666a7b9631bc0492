//! The transport contract shared by every mirror channel implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callback invoked once per received payload.
pub type Listener<P> = Box<dyn FnMut(&P) + Send>;

/// A best-effort broadcast medium.
///
/// Every operation is infallible from the caller's side. A transport that
/// cannot reach its medium silently becomes a no-op.
pub trait Transport<P> {
    /// Deliver `payload` to every other participant on the channel.
    fn broadcast(&self, payload: &P);

    /// Register a listener. The returned [`Subscription`] removes exactly
    /// this listener.
    fn subscribe(&self, listener: Listener<P>) -> Subscription;

    /// Deliver queued inbound payloads to listeners in arrival order.
    ///
    /// Returns the number of payloads delivered. Must not be called from
    /// inside a listener.
    fn pump(&self) -> usize;

    /// Release the medium and drop all listeners. Later broadcasts are no-ops.
    fn close(&self);

    /// Whether payloads can currently leave this participant.
    fn is_available(&self) -> bool;
}

impl<P, T: Transport<P> + ?Sized> Transport<P> for Box<T> {
    fn broadcast(&self, payload: &P) {
        (**self).broadcast(payload)
    }

    fn subscribe(&self, listener: Listener<P>) -> Subscription {
        (**self).subscribe(listener)
    }

    fn pump(&self) -> usize {
        (**self).pump()
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<P, T: Transport<P> + ?Sized> Transport<P> for Arc<T> {
    fn broadcast(&self, payload: &P) {
        (**self).broadcast(payload)
    }

    fn subscribe(&self, listener: Listener<P>) -> Subscription {
        (**self).subscribe(listener)
    }

    fn pump(&self) -> usize {
        (**self).pump()
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Handle returned by [`Transport::subscribe`].
///
/// Unsubscribing is idempotent, and dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription with nothing behind it, handed out by offline transports.
    pub fn detached() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Deregister the listener. Calling this more than once does nothing.
    pub fn unsubscribe(&self) {
        let cancel = lock(&self.cancel).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether the listener is still registered through this handle.
    pub fn is_active(&self) -> bool {
        lock(&self.cancel).is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

type SharedListener<P> = Arc<Mutex<Listener<P>>>;

/// Listener registry used by the channel implementations.
pub(crate) struct Listeners<P> {
    next_id: u64,
    entries: Vec<(u64, SharedListener<P>)>,
}

impl<P: 'static> Listeners<P> {
    pub(crate) fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            next_id: 0,
            entries: Vec::new(),
        }))
    }

    /// Register `listener` and return a subscription bound to it.
    pub(crate) fn register(registry: &Arc<Mutex<Self>>, listener: Listener<P>) -> Subscription {
        let id = {
            let mut guard = lock(registry);
            let id = guard.next_id;
            guard.next_id += 1;
            guard.entries.push((id, Arc::new(Mutex::new(listener))));
            id
        };

        let weak: Weak<Mutex<Self>> = Arc::downgrade(registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                lock(&registry).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invoke every registered listener with `payload`.
    ///
    /// Listeners are snapshotted first so a callback may unsubscribe or
    /// broadcast without deadlocking; one removed mid-dispatch is skipped.
    pub(crate) fn dispatch(registry: &Arc<Mutex<Self>>, payload: &P) {
        let snapshot: Vec<(u64, SharedListener<P>)> = lock(registry).entries.clone();
        for (id, listener) in snapshot {
            if !lock(registry).contains(id) {
                continue;
            }
            let mut callback = lock(&listener);
            (*callback)(payload);
        }
    }

    pub(crate) fn clear(registry: &Arc<Mutex<Self>>) {
        lock(registry).entries.clear();
    }

    pub(crate) fn len(registry: &Arc<Mutex<Self>>) -> usize {
        lock(registry).entries.len()
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Lock a mutex, recovering the data if a listener panicked while holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = Listeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        let _sub_a = Listeners::register(&registry, Box::new(move |v: &u32| a.lock().unwrap().push(("a", *v))));
        let b = Arc::clone(&seen);
        let _sub_b = Listeners::register(&registry, Box::new(move |v: &u32| b.lock().unwrap().push(("b", *v))));

        Listeners::dispatch(&registry, &7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let registry = Listeners::<u32>::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        let first = Listeners::register(&registry, Box::new(move |_: &u32| *c.lock().unwrap() += 1));
        let c = Arc::clone(&count);
        let _second = Listeners::register(&registry, Box::new(move |_: &u32| *c.lock().unwrap() += 10));

        first.unsubscribe();
        first.unsubscribe();
        assert!(!first.is_active());
        assert_eq!(Listeners::len(&registry), 1);

        Listeners::dispatch(&registry, &1);
        assert_eq!(*count.lock().unwrap(), 10);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = Listeners::<u32>::new();
        {
            let _sub = Listeners::register(&registry, Box::new(|_: &u32| {}));
            assert_eq!(Listeners::len(&registry), 1);
        }
        assert_eq!(Listeners::len(&registry), 0);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Listeners::<u32>::new();
        let sub = Listeners::register(&registry, Box::new(|_: &u32| {}));
        drop(registry);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_detached_subscription() {
        let sub = Subscription::detached();
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}
