//! Deferred work and the rendezvous used to wait for it
//!
//! Producers package work as an [`Event`] and push it onto an
//! [`EventQueue`]; a single worker drains the queue. Callers that need the
//! outcome synchronously park on a [`Ticket`].

pub mod queue;
pub mod ticket;

pub use queue::{Event, EventQueue, MAX_EVENTS};
pub use ticket::{Completion, Ticket};
