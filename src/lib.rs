// src/lib.rs

//! auditly: on-demand audit of a single web page.
//!
//! An audit fetches the page once, checks it across six categories (meta,
//! content, technical SEO, speed, security and link structure) and combines
//! the category scores into one weighted composite.
//!
//! ```no_run
//! use auditly::{AuditConfig, Auditor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let auditor = Auditor::new(AuditConfig::default())?;
//! let report = auditor.run_audit("https://example.com/").await?;
//! println!("{:?}", report.composite_score());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::{AuditConfig, CategoryWeights};
pub use crate::core::auditor::{AuditPhase, Auditor, ProgressCallback};
pub use crate::core::error::{AuditError, ConfigError, FailureReason, FetchError, FetchErrorKind};
pub use crate::core::models::{AuditReport, AuditRequest, AuditSnapshot, Category, CategoryResult, Finding, Severity};
