//! Machine definition, events and per-entity state.

use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, RwLock};

/// Binds the concrete types of one state machine specialization.
pub trait Machine: Send + Sync + 'static {
    /// Lifecycle states
    type State: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Event discriminants
    type EventKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Event payload
    type Payload: Send + 'static;
    /// Entity-specific data, mutated only under the entity lock
    type Context: Send + 'static;
}

/// An event: a kind plus an optional payload for that kind.
pub struct Event<M: Machine> {
    /// Event discriminant
    pub kind: M::EventKind,
    /// Payload associated with the kind
    pub payload: Option<M::Payload>,
}

impl<M: Machine> Event<M> {
    /// Event without payload.
    pub fn new(kind: M::EventKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Event carrying `payload`.
    pub fn with_payload(kind: M::EventKind, payload: M::Payload) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }

    /// Borrowed payload, if any.
    pub fn payload(&self) -> Option<&M::Payload> {
        self.payload.as_ref()
    }
}

impl<M: Machine> fmt::Debug for Event<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// What a state callback is being invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The event itself, delivered to the callback of the current state
    Event,
    /// Synthetic exit from the current state
    Exit,
    /// Synthetic entry into the new state
    Entry,
}

pub(crate) struct Core<M: Machine> {
    pub(crate) next: Option<Event<M>>,
    pub(crate) context: M::Context,
}

/// An entity driven by a state machine (a UE, a DU, an AMF).
///
/// The current state is readable at any time. The context and the queued-next slot
/// live behind the entity lock, held for the whole handling of an event.
pub struct Entity<M: Machine> {
    current: RwLock<M::State>,
    core: Mutex<Core<M>>,
}

impl<M: Machine> Entity<M> {
    /// Creates an entity in `initial` state.
    pub fn new(initial: M::State, context: M::Context) -> Self {
        Self {
            current: RwLock::new(initial),
            core: Mutex::new(Core {
                next: None,
                context,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> M::State {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: M::State) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Core<M>> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` with shared access to the context under the entity lock.
    ///
    /// Must not be called from a callback running for this same entity. Outside
    /// callbacks the context is read-only; only [`Scope::context_mut`] mutates it.
    ///
    /// ```compile_fail
    /// use cucp_fsm::{Entity, Machine};
    ///
    /// fn bump<M: Machine<Context = u32>>(entity: &Entity<M>) {
    ///     entity.with_context(|count| *count += 1);
    /// }
    /// ```
    pub fn with_context<R>(&self, f: impl FnOnce(&M::Context) -> R) -> R {
        f(&self.lock_core().context)
    }

    /// Overwrites the current state without running any callback.
    #[cfg(any(test, feature = "fuzzing"))]
    pub fn force_state(&self, state: M::State) {
        let _core = self.lock_core();
        self.set_state(state);
    }
}

impl<M: Machine> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// What a callback sees while it runs under the entity lock.
pub struct Scope<'a, M: Machine> {
    state: M::State,
    context: &'a mut M::Context,
    next: &'a mut Option<Event<M>>,
}

impl<'a, M: Machine> Scope<'a, M> {
    pub(crate) fn new(state: M::State, core: &'a mut Core<M>) -> Self {
        Self {
            state,
            context: &mut core.context,
            next: &mut core.next,
        }
    }

    /// State the callback was invoked for.
    pub fn state(&self) -> M::State {
        self.state
    }

    /// Entity context.
    pub fn context(&self) -> &M::Context {
        &*self.context
    }

    /// Mutable entity context.
    pub fn context_mut(&mut self) -> &mut M::Context {
        &mut *self.context
    }

    /// Queues an event to run on this entity once the current one finishes, still
    /// under the same lock.
    ///
    /// The slot holds a single event: queuing over an occupied slot replaces it and
    /// returns the displaced event.
    pub fn queue_event(&mut self, event: Event<M>) -> Option<Event<M>> {
        self.next.replace(event)
    }
}
