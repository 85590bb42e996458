// crates/loadstone-runtime/src/lib.rs
// ============================================================================
// Module: Loadstone Runtime Library
// Description: Run lifecycle management and the external operation set.
// Purpose: Wire token fetch, engine, store, and stream into one facade.
// Dependencies: loadstone-auth, loadstone-core, loadstone-engine,
//               loadstone-store-sqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`RunCoordinator`] owns the single active-run slot and drives each run's
//! pipeline: optional token-fetch preflight, engine execution, terminal
//! persistence, and terminal stream events. Catalog operations pass through
//! to the store so adapters program against one surface.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod coordinator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use coordinator::RunCoordinator;
pub use coordinator::StartError;
pub use loadstone_auth::AuthError;
pub use loadstone_auth::BearerToken;
pub use loadstone_core::MetricHub;
pub use loadstone_core::StreamEvent;
pub use loadstone_core::Subscription;
pub use loadstone_store_sqlite::CatalogStore;
pub use loadstone_store_sqlite::CatalogStoreConfig;
pub use loadstone_store_sqlite::ProjectExport;
pub use loadstone_store_sqlite::StoreError;
