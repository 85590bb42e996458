// crates/loadstone-store-sqlite/src/lib.rs
// ============================================================================
// Module: Loadstone SQLite Store Library
// Description: Durable catalog of projects, endpoints, runs, and timelines.
// Purpose: Persist run history behind a single serialized connection.
// Dependencies: loadstone-core, rusqlite, serde, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! The catalog store persists the full data model: projects own endpoints
//! (cascade delete), runs capture their target configuration at creation and
//! survive endpoint deletion with a cleared link, and sampled snapshots form
//! each run's timeline. A single mutex-guarded connection serializes all
//! access; only import spans a multi-statement transaction.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod export;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use export::ExportedEndpoint;
pub use export::ExportedProject;
pub use export::ExportedRun;
pub use export::ProjectExport;
pub use store::CatalogStore;
pub use store::CatalogStoreConfig;
pub use store::SqliteJournalMode;
pub use store::SqliteSyncMode;
pub use store::StoreError;
