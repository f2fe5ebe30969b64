// src/core/mod.rs

// The audit pipeline. Data flows one way: the auditor fetches a snapshot,
// hands it to the analyzers and aggregates what they return.

/// All data structures shared across the pipeline, from `AuditRequest` to
/// `AuditReport`.
pub mod models;

/// Typed errors of the library.
pub mod error;

/// Finding codes with their severity and remediation text, and the default
/// rubric points of every check.
pub mod knowledge_base;

/// The queryable HTML view analyzers read from.
pub mod page;

/// Primary page retrieval and the best-effort auxiliary fetches.
pub mod fetcher;

/// Registration and certificate lookups for the audited host.
pub mod lookup;

/// The six category analyzers and their rubric scoring.
pub mod analyzers;

pub mod aggregator;

/// Drives one audit from URL to report.
pub mod auditor;
