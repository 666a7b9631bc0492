//! In-process broadcast medium.
//!
//! A [`Bus`] plays the role of the shared medium: every [`MirrorChannel`]
//! opened on it under the same name hears what the others broadcast. A
//! channel never hears itself, and payloads sent while nobody else is
//! listening are dropped.

use crate::transport::{lock, Listener, Listeners, Subscription, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Inbox<P> = Arc<Mutex<VecDeque<P>>>;

struct Endpoint<P> {
    id: u64,
    name: String,
    inbox: Inbox<P>,
}

struct BusInner<P> {
    next_id: u64,
    endpoints: Vec<Endpoint<P>>,
}

/// A broadcast medium shared by every channel opened from it.
pub struct Bus<P> {
    inner: Arc<Mutex<BusInner<P>>>,
}

impl<P> Clone for Bus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Clone + Send + 'static> Default for Bus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send + 'static> Bus<P> {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                endpoints: Vec::new(),
            })),
        }
    }

    /// Open a new participant on the channel called `name`.
    pub fn open(&self, name: impl Into<String>) -> MirrorChannel<P> {
        let name = name.into();
        let inbox: Inbox<P> = Arc::new(Mutex::new(VecDeque::new()));

        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.endpoints.push(Endpoint {
                id,
                name: name.clone(),
                inbox: Arc::clone(&inbox),
            });
            id
        };

        tracing::debug!(channel = %name, id, "opened mirror channel");

        MirrorChannel {
            id,
            name,
            bus: Some(self.clone()),
            inbox,
            listeners: Listeners::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of open participants on `name`.
    pub fn participants(&self, name: &str) -> usize {
        lock(&self.inner)
            .endpoints
            .iter()
            .filter(|e| e.name == name)
            .count()
    }

    fn deliver(&self, from: u64, name: &str, payload: &P) -> usize {
        let inner = lock(&self.inner);
        let mut delivered = 0;
        for endpoint in inner
            .endpoints
            .iter()
            .filter(|e| e.id != from && e.name == name)
        {
            lock(&endpoint.inbox).push_back(payload.clone());
            delivered += 1;
        }
        delivered
    }

    fn remove(&self, id: u64) {
        lock(&self.inner).endpoints.retain(|e| e.id != id);
    }
}

/// One participant on a named channel of a [`Bus`].
pub struct MirrorChannel<P> {
    id: u64,
    name: String,
    bus: Option<Bus<P>>,
    inbox: Inbox<P>,
    listeners: Arc<Mutex<Listeners<P>>>,
    closed: AtomicBool,
}

impl<P: Clone + Send + 'static> MirrorChannel<P> {
    /// A participant with no medium behind it. Every operation is a no-op.
    pub fn unavailable(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::warn!(channel = %name, "mirror transport unavailable, running offline");
        Self {
            id: u64::MAX,
            name,
            bus: None,
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            listeners: Listeners::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Payloads received but not yet pumped.
    pub fn pending(&self) -> usize {
        lock(&self.inbox).len()
    }

    /// Registered listener count.
    pub fn listener_count(&self) -> usize {
        Listeners::len(&self.listeners)
    }
}

impl<P: Clone + Send + 'static> Transport<P> for MirrorChannel<P> {
    fn broadcast(&self, payload: &P) {
        if self.is_closed() {
            tracing::trace!(channel = %self.name, "broadcast on closed channel dropped");
            return;
        }
        let Some(bus) = &self.bus else {
            return;
        };
        let delivered = bus.deliver(self.id, &self.name, payload);
        tracing::trace!(channel = %self.name, delivered, "broadcast");
    }

    fn subscribe(&self, listener: Listener<P>) -> Subscription {
        if self.is_closed() {
            return Subscription::detached();
        }
        Listeners::register(&self.listeners, listener)
    }

    fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            // Pop under the lock, dispatch outside it.
            let next = lock(&self.inbox).pop_front();
            let Some(payload) = next else { break };
            Listeners::dispatch(&self.listeners, &payload);
            delivered += 1;
        }
        delivered
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = &self.bus {
            bus.remove(self.id);
        }
        lock(&self.inbox).clear();
        Listeners::clear(&self.listeners);
        tracing::debug!(channel = %self.name, id = self.id, "closed mirror channel");
    }

    fn is_available(&self) -> bool {
        self.bus.is_some() && !self.is_closed()
    }
}

impl<P> Drop for MirrorChannel<P> {
    fn drop(&mut self) {
        if let Some(bus) = &self.bus {
            lock(&bus.inner).endpoints.retain(|e| e.id != self.id);
        }
    }
}
