//! Audit trail of monitoring activity, shown to the student on request.

pub mod log;

pub use log::{AuditLog, AuditStats, SharedAuditLog};
