//! Listener registry and disposers.
//!
//! Listeners are kept per [`EventKind`] in registration order. Each
//! registration gets a [`ListenerId`] token; removal goes by token so two
//! identical closures never shadow each other.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::ListenerId;
use crate::protocol::CloseEvent;

// ============================================================================
// Types
// ============================================================================

/// Listener without payload (open, reopen, error).
pub type SignalListener = Arc<dyn Fn() + Send + Sync>;

/// Listener for decoded messages.
pub type MessageListener<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Listener for close events.
pub type CloseListener = Arc<dyn Fn(&CloseEvent) + Send + Sync>;

// ============================================================================
// EventKind
// ============================================================================

/// Kind of event a listener is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First open of a session.
    Open,
    /// Open that ends a reconnection session.
    Reopen,
    /// Incoming message.
    Message,
    /// Connection closed.
    Close,
    /// Transport or usage error.
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Reopen => "reopen",
            Self::Message => "message",
            Self::Close => "close",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Handler
// ============================================================================

/// A registered callback, tagged by payload shape.
pub(crate) enum Handler<M> {
    Signal(SignalListener),
    Message(MessageListener<M>),
    Close(CloseListener),
}

impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Signal(f) => Self::Signal(Arc::clone(f)),
            Self::Message(f) => Self::Message(Arc::clone(f)),
            Self::Close(f) => Self::Close(Arc::clone(f)),
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Ordered listener lists keyed by event kind.
pub(crate) struct Listeners<M> {
    entries: FxHashMap<EventKind, Vec<(ListenerId, Handler<M>)>>,
}

impl<M> Default for Listeners<M> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<M> Listeners<M> {
    /// Appends a handler and returns its token.
    pub(crate) fn add(&mut self, kind: EventKind, handler: Handler<M>) -> ListenerId {
        let id = ListenerId::generate();
        self.entries.entry(kind).or_default().push((id, handler));
        id
    }

    /// Removes the registration with `id`. Returns `true` if it existed.
    pub(crate) fn remove(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(list) = self.entries.get_mut(&kind) else {
            return false;
        };

        let before = list.len();
        list.retain(|(entry_id, _)| *entry_id != id);
        list.len() != before
    }

    /// Copies the handlers of `kind` in dispatch order.
    ///
    /// Callers invoke the copy after releasing the registry lock.
    pub(crate) fn snapshot(&self, kind: EventKind) -> Vec<Handler<M>> {
        self.entries
            .get(&kind)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the number of handlers registered for `kind`.
    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.entries.get(&kind).map_or(0, Vec::len)
    }
}

// ============================================================================
// Disposer
// ============================================================================

/// Removes one listener registration.
///
/// Dropping a disposer without calling [`Disposer::dispose`] keeps the
/// listener registered.
pub struct Disposer {
    registration: Option<(EventKind, ListenerId)>,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

impl Disposer {
    /// Creates a disposer for a live registration.
    pub(crate) fn new<M>(
        registry: &Arc<Mutex<Listeners<M>>>,
        kind: EventKind,
        id: ListenerId,
    ) -> Self
    where
        M: Send + 'static,
    {
        let registry: Weak<Mutex<Listeners<M>>> = Arc::downgrade(registry);
        Self {
            registration: Some((kind, id)),
            remove: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().remove(kind, id);
                }
            })),
        }
    }

    /// Creates a disposer with nothing to remove.
    pub(crate) fn noop() -> Self {
        Self {
            registration: None,
            remove: None,
        }
    }

    /// Returns the registration token, if the listener was retained.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<ListenerId> {
        self.registration.map(|(_, id)| id)
    }

    /// Returns the event kind, if the listener was retained.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.registration.map(|(kind, _)| kind)
    }

    /// Removes the listener. Later events no longer reach it.
    pub fn dispose(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Handler<()>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handler = Handler::Signal(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        (count, handler)
    }

    fn fire(listeners: &Listeners<()>, kind: EventKind) {
        for handler in listeners.snapshot(kind) {
            if let Handler::Signal(f) = handler {
                f();
            }
        }
    }

    #[test]
    fn test_dispatch_order_is_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::<()>::default();

        for n in 0..3 {
            let order = Arc::clone(&order);
            listeners.add(
                EventKind::Open,
                Handler::Signal(Arc::new(move || order.lock().push(n))),
            );
        }

        fire(&listeners, EventKind::Open);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_by_token_only() {
        let mut listeners = Listeners::<()>::default();
        let (first, handler) = counter();
        let shared = handler.clone();

        // Same closure registered twice
        let id_a = listeners.add(EventKind::Error, handler);
        listeners.add(EventKind::Error, shared);

        assert!(listeners.remove(EventKind::Error, id_a));
        assert!(!listeners.remove(EventKind::Error, id_a));
        assert_eq!(listeners.count(EventKind::Error), 1);

        fire(&listeners, EventKind::Error);
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut listeners = Listeners::<()>::default();
        let (count, handler) = counter();
        listeners.add(EventKind::Open, handler);

        fire(&listeners, EventKind::Reopen);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(listeners.count(EventKind::Reopen), 0);
    }

    #[test]
    fn test_disposer_removes_registration() {
        let registry = Arc::new(Mutex::new(Listeners::<()>::default()));
        let (_count, handler) = counter();
        let id = registry.lock().add(EventKind::Close, handler);

        let disposer = Disposer::new(&registry, EventKind::Close, id);
        assert_eq!(disposer.id(), Some(id));
        assert_eq!(disposer.kind(), Some(EventKind::Close));

        disposer.dispose();
        assert_eq!(registry.lock().count(EventKind::Close), 0);
    }

    #[test]
    fn test_disposer_outlives_registry() {
        let registry = Arc::new(Mutex::new(Listeners::<()>::default()));
        let (_count, handler) = counter();
        let id = registry.lock().add(EventKind::Open, handler);

        let disposer = Disposer::new(&registry, EventKind::Open, id);
        drop(registry);
        disposer.dispose();
    }

    #[test]
    fn test_noop_disposer() {
        let disposer = Disposer::noop();
        assert!(disposer.id().is_none());
        disposer.dispose();
    }
}
