// crates/loadstone-core/src/identifiers.rs
// ============================================================================
// Module: Loadstone Identifiers
// Description: Strongly typed identifiers for catalog entities and runs.
// Purpose: Keep surrogate ids and run tokens distinct across crate seams.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Surrogate identifiers are assigned by the store (SQLite rowids) and are
//! always positive. Run tokens are opaque strings generated at run creation
//! and are the only externally visible run identifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Surrogate Identifiers
// ============================================================================

/// Project identifier assigned by the store.
///
/// # Invariants
/// - Always >= 1 (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(i64);

impl ProjectId {
    /// Creates a project identifier from a raw value (returns `None` unless positive).
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw >= 1 { Some(Self(raw)) } else { None }
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Endpoint identifier assigned by the store.
///
/// # Invariants
/// - Always >= 1 (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(i64);

impl EndpointId {
    /// Creates an endpoint identifier from a raw value (returns `None` unless positive).
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw >= 1 { Some(Self(raw)) } else { None }
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Run identifier assigned by the store.
///
/// # Invariants
/// - Always >= 1 (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    /// Creates a run identifier from a raw value (returns `None` unless positive).
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw >= 1 { Some(Self(raw)) } else { None }
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Run Token
// ============================================================================

/// Opaque external identifier for a run.
///
/// # Invariants
/// - Opaque UTF-8 string; uniqueness is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(String);

impl RunToken {
    /// Creates a new run token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Subscriber Identifier
// ============================================================================

/// Identifier for a metric stream subscriber.
///
/// # Invariants
/// - Assigned by the hub from a monotonic counter; unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Creates a subscriber identifier from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
