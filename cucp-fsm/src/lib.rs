//! Per-entity event/state engine
//!
//! A [`Fsm`] is built once per entity kind from a transition table, one callback
//! per state and an optional generic handler for non-transitional events. Every
//! [`Entity`] carries its own lock, so events for one entity run strictly one at a
//! time while different entities proceed in parallel.
//!
//! # Example
//!
//! ```
//! use cucp_fsm::{Entity, Event, FsmBuilder, Machine};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum State { Idle, Busy }
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Kind { Start }
//!
//! struct Worker;
//! impl Machine for Worker {
//!     type State = State;
//!     type EventKind = Kind;
//!     type Payload = ();
//!     type Context = u32;
//! }
//!
//! let fsm = FsmBuilder::<Worker>::new("worker")
//!     .transition(State::Idle, Kind::Start, State::Busy)
//!     .on_state(State::Idle, |scope, _, _| *scope.context_mut() += 1)
//!     .on_state(State::Busy, |_, _, _| {})
//!     .build()
//!     .unwrap();
//!
//! let entity = Entity::<Worker>::new(State::Idle, 0);
//! fsm.sync_send_event(&entity, Event::new(Kind::Start)).unwrap();
//! assert_eq!(entity.state(), State::Busy);
//! ```

pub mod entity;
pub mod error;
pub mod fsm;

pub use entity::{Entity, Event, Machine, Scope, Step};
pub use error::{FsmError, Result};
pub use fsm::{Callback, EventHandle, Fsm, FsmBuilder, GenericHandler, DEFAULT_WORKERS};
