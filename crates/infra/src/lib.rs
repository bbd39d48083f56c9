//! Infrastructure layer: event storage, dispatch, read models and the
//! services and reports built on top of them.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod services;
pub mod workers;

pub use services::{PosError, PosResult, Till};
