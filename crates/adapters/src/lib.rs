//! connectum adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `supabase`: hosted backend REST gateway, profile store and object storage
//! - `change_feed`: polling change feed built on snapshot fingerprints
//! - `memory`: in-memory backend for tests and offline demos
//! - `store`: SQLite and in-memory local fallback stores
//! - `translate`: DeepL, proxy and mock translators

pub mod change_feed;
pub mod memory;
mod store_memory;
mod store_sqlite;
pub mod supabase;
pub mod translate;

use reqwest::Client;
use std::time::Duration;

/// Re-exports for local store adapters
pub mod store {
    pub use crate::store_memory::InMemoryLocalStore;
    pub use crate::store_sqlite::SqliteLocalStore;
}

pub use memory::InMemoryBackend;
pub use supabase::SupabaseGateway;

/// Build an HTTP client with a request timeout
pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|error| {
        tracing::warn!(error = %error, "Falling back to default HTTP client");
        Client::new()
    })
}
