//! Stateful coordination: action execution and the console store.

pub mod execution;
pub mod store;
