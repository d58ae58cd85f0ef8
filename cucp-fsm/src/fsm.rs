//! Transition table, callback registry and event execution.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, trace, warn};

use crate::entity::{Core, Entity, Event, Machine, Scope, Step};
use crate::error::{FsmError, Result};

/// Callback invoked for every event matched against a state, and for the synthetic
/// exit/entry steps around a state change.
pub type Callback<M> = Arc<dyn Fn(&mut Scope<'_, M>, Step, &Event<M>) + Send + Sync>;

/// Handler for non-transitional events. It never changes the state.
pub type GenericHandler<M> = Arc<dyn Fn(&mut Scope<'_, M>, &Event<M>) + Send + Sync>;

/// Default number of concurrent event jobs.
pub const DEFAULT_WORKERS: usize = 8;

/// Builds and validates an [`Fsm`].
pub struct FsmBuilder<M: Machine> {
    name: &'static str,
    transitions: Vec<(M::State, M::EventKind, M::State)>,
    callbacks: HashMap<M::State, Callback<M>>,
    non_transitional: Vec<M::EventKind>,
    generic: Option<GenericHandler<M>>,
    workers: usize,
}

impl<M: Machine> FsmBuilder<M> {
    /// Starts a definition. `name` tags logs and errors.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            transitions: Vec::new(),
            callbacks: HashMap::new(),
            non_transitional: Vec::new(),
            generic: None,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Defines `(from, kind) -> to`.
    pub fn transition(mut self, from: M::State, kind: M::EventKind, to: M::State) -> Self {
        self.transitions.push((from, kind, to));
        self
    }

    /// Defines `(from, kind) -> to` for every state in `from`.
    pub fn transition_from_any(
        mut self,
        from: impl IntoIterator<Item = M::State>,
        kind: M::EventKind,
        to: M::State,
    ) -> Self {
        for state in from {
            self.transitions.push((state, kind, to));
        }
        self
    }

    /// Registers the callback of `state`, replacing any earlier one.
    pub fn on_state(
        mut self,
        state: M::State,
        callback: impl Fn(&mut Scope<'_, M>, Step, &Event<M>) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.insert(state, Arc::new(callback));
        self
    }

    /// Declares event kinds that bypass the transition table.
    pub fn non_transitional(mut self, kinds: impl IntoIterator<Item = M::EventKind>) -> Self {
        self.non_transitional.extend(kinds);
        self
    }

    /// Handler for the non-transitional kinds.
    pub fn generic_handler(
        mut self,
        handler: impl Fn(&mut Scope<'_, M>, &Event<M>) + Send + Sync + 'static,
    ) -> Self {
        self.generic = Some(Arc::new(handler));
        self
    }

    /// Bounds the number of concurrently running [`Fsm::send_event`] jobs.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Validates the definition.
    ///
    /// Fails if a state referenced by the table (as source or target) has no callback,
    /// if a non-transitional kind appears in the table, if non-transitional kinds have
    /// no generic handler, or if a pair is given two different targets.
    pub fn build(self) -> Result<Fsm<M>> {
        let name = self.name;
        let non_transitional: HashSet<M::EventKind> = self.non_transitional.into_iter().collect();

        if !non_transitional.is_empty() && self.generic.is_none() {
            return Err(FsmError::MissingGenericHandler { fsm: name });
        }

        let mut table = HashMap::with_capacity(self.transitions.len());
        for (from, kind, to) in self.transitions {
            if non_transitional.contains(&kind) {
                return Err(FsmError::NonTransitionalInTable {
                    fsm: name,
                    event: format!("{kind:?}"),
                });
            }
            for state in [from, to] {
                if !self.callbacks.contains_key(&state) {
                    return Err(FsmError::MissingCallback {
                        fsm: name,
                        state: format!("{state:?}"),
                    });
                }
            }
            if let Some(existing) = table.insert((from, kind), to) {
                if existing != to {
                    return Err(FsmError::ConflictingTransition {
                        fsm: name,
                        state: format!("{from:?}"),
                        event: format!("{kind:?}"),
                    });
                }
            }
        }

        debug!(
            fsm = name,
            transitions = table.len(),
            workers = self.workers,
            "state machine built"
        );

        Ok(Fsm {
            name,
            table,
            callbacks: self.callbacks,
            non_transitional,
            generic: self.generic,
            workers: self.workers,
            pool: Arc::new(Semaphore::new(self.workers)),
            closed: AtomicBool::new(false),
        })
    }
}

/// A validated state machine shared by every entity of one kind.
///
/// Events for one entity are handled one at a time under that entity's lock.
/// Entities do not block each other.
pub struct Fsm<M: Machine> {
    name: &'static str,
    table: HashMap<(M::State, M::EventKind), M::State>,
    callbacks: HashMap<M::State, Callback<M>>,
    non_transitional: HashSet<M::EventKind>,
    generic: Option<GenericHandler<M>>,
    workers: usize,
    pool: Arc<Semaphore>,
    closed: AtomicBool,
}

impl<M: Machine> Fsm<M> {
    /// Machine name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Target state of `(state, kind)` if defined.
    pub fn target(&self, state: M::State, kind: M::EventKind) -> Option<M::State> {
        self.table.get(&(state, kind)).copied()
    }

    /// Handles `event` on the caller's thread, under the entity lock.
    ///
    /// Blocks until the event and any event queued behind it have run. Only the
    /// outcome of `event` itself is returned; rejected queued events are logged.
    ///
    /// Never call this from inside a callback running for the same entity: the
    /// entity lock is not reentrant and the call deadlocks. Use
    /// [`Scope::queue_event`] instead.
    pub fn sync_send_event(&self, entity: &Entity<M>, event: Event<M>) -> Result<()> {
        let mut core = entity.lock_core();
        let outcome = self.handle(entity, &mut core, event);

        while let Some(next) = core.next.take() {
            if let Err(e) = self.handle(entity, &mut core, next) {
                warn!(fsm = self.name, error = %e, "queued event rejected");
            }
        }

        outcome
    }

    /// Submits `event` to the worker pool and returns immediately.
    ///
    /// Must be called from within a tokio runtime. The returned handle yields the
    /// outcome once the job ran.
    pub fn send_event(self: &Arc<Self>, entity: Arc<Entity<M>>, event: Event<M>) -> EventHandle {
        let (tx, rx) = oneshot::channel();

        if self.closed.load(Ordering::Acquire) {
            let _ = tx.send(Err(FsmError::ShuttingDown));
            return EventHandle { rx };
        }

        let fsm = Arc::clone(self);
        tokio::spawn(async move {
            let permit = match Arc::clone(&fsm.pool).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = tx.send(Err(FsmError::ShuttingDown));
                    return;
                }
            };

            let outcome = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                fsm.sync_send_event(&entity, event)
            })
            .await
            .unwrap_or(Err(FsmError::Abandoned));

            let _ = tx.send(outcome);
        });

        EventHandle { rx }
    }

    /// Stops accepting work and waits up to `grace` for in-flight jobs.
    ///
    /// Returns `true` if every job finished in time. Events submitted afterwards
    /// resolve to [`FsmError::ShuttingDown`].
    pub async fn drain(&self, grace: Duration) -> bool {
        self.closed.store(true, Ordering::Release);

        let workers = u32::try_from(self.workers).unwrap_or(u32::MAX);
        let drained = match tokio::time::timeout(grace, self.pool.acquire_many(workers)).await {
            Ok(Ok(permits)) => {
                permits.forget();
                true
            }
            Ok(Err(_)) => true,
            Err(_) => {
                warn!(fsm = self.name, ?grace, "event jobs still running after grace period");
                false
            }
        };

        self.pool.close();
        debug!(fsm = self.name, drained, "state machine drained");
        drained
    }

    fn handle(&self, entity: &Entity<M>, core: &mut Core<M>, event: Event<M>) -> Result<()> {
        let current = entity.state();

        if self.non_transitional.contains(&event.kind) {
            if let Some(handler) = &self.generic {
                trace!(fsm = self.name, state = ?current, event = ?event.kind, "non-transitional event");
                handler(&mut Scope::new(current, core), &event);
            }
            return Ok(());
        }

        let Some(next) = self.target(current, event.kind) else {
            return Err(FsmError::UndefinedTransition {
                fsm: self.name,
                state: format!("{current:?}"),
                event: format!("{:?}", event.kind),
            });
        };

        self.invoke(current, core, Step::Event, &event);

        if next != current {
            self.invoke(current, core, Step::Exit, &event);
            entity.set_state(next);
            debug!(fsm = self.name, from = ?current, to = ?next, event = ?event.kind, "state changed");
            self.invoke(next, core, Step::Entry, &event);
        }

        Ok(())
    }

    fn invoke(&self, state: M::State, core: &mut Core<M>, step: Step, event: &Event<M>) {
        if let Some(callback) = self.callbacks.get(&state) {
            callback(&mut Scope::new(state, core), step, event);
        }
    }
}

/// Outcome of an event submitted with [`Fsm::send_event`].
#[derive(Debug)]
pub struct EventHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl EventHandle {
    /// Waits for the job and returns its outcome.
    pub async fn outcome(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(FsmError::Abandoned))
    }
}
