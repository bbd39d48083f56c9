//! Append-only event store boundary.
//!
//! [`InMemoryEventStore`] for tests and throwaway runs, [`JournalEventStore`] when
//! events have to survive a restart.

pub mod in_memory;
pub mod journal;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use journal::JournalEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
