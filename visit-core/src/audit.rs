//! Security audit events
//!
//! Events are emitted through the `log` facade under the `visits::audit`
//! target so they can be routed or filtered separately
//! (`RUST_LOG=visits::audit=info`).

use std::fmt;

pub const AUDIT_TARGET: &str = "visits::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    AuthSuccess,
    AuthFailure,
    DataAccess,
    SuspiciousActivity,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::AuthSuccess => write!(f, "AUTH_SUCCESS"),
            AuditKind::AuthFailure => write!(f, "AUTH_FAILURE"),
            AuditKind::DataAccess => write!(f, "DATA_ACCESS"),
            AuditKind::SuspiciousActivity => write!(f, "SUSPICIOUS_ACTIVITY"),
        }
    }
}

fn emit(kind: AuditKind, user_id: Option<&str>, details: &str) {
    let level = match kind {
        AuditKind::AuthFailure | AuditKind::SuspiciousActivity => log::Level::Warn,
        AuditKind::AuthSuccess | AuditKind::DataAccess => log::Level::Info,
    };
    log::log!(
        target: AUDIT_TARGET,
        level,
        "[{}] user={} {}",
        kind,
        user_id.unwrap_or("-"),
        details
    );
}

pub fn log_auth_success(user_id: &str) {
    emit(
        AuditKind::AuthSuccess,
        Some(user_id),
        &format!("User {} successfully authenticated", user_id),
    );
}

pub fn log_auth_failure(details: &str) {
    emit(AuditKind::AuthFailure, None, details);
}

/// Records that `user_id` performed `action` ("created", "deleted", ...)
/// on `resource`
pub fn log_data_access(user_id: &str, resource: &str, action: &str) {
    emit(
        AuditKind::DataAccess,
        Some(user_id),
        &format!("User {} {} {}", user_id, action, resource),
    );
}

pub fn log_suspicious_activity(details: &str, user_id: Option<&str>) {
    emit(AuditKind::SuspiciousActivity, user_id, details);
}

/// Flags input that sanitization had to alter beyond trimming whitespace
pub fn note_sanitized(field: &str, original: &str, sanitized: &str) {
    if original.trim() != sanitized {
        log_suspicious_activity(
            &format!("Input for '{}' contained markup and was sanitized", field),
            None,
        );
    }
}
