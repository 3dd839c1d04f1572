//! connectum domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Records, view models and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `mapper`: Pure record to view model mapping
//! - `ledger`: Experience, levels and rewards
//! - `usecases`: Feed engine, reconciler, translation, gamification

pub mod ledger;
pub mod mapper;
pub mod model;
pub mod ports;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;

pub use model::*;
pub use ports::*;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
