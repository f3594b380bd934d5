//! Key namespace in the attempt store.
//!
//! Every key the policy reads or writes is formed here. Prefixes are distinct per
//! purpose so that no two kinds of record can collide.

pub const LOGIN_ATTEMPTS_PREFIX: &str = "login_attempts:";
pub const IP_ATTEMPTS_PREFIX: &str = "ip_attempts:";
pub const LOCKOUT_PREFIX: &str = "lockout:";
pub const IP_BLOCKED_PREFIX: &str = "ip_blocked:";
pub const LOCKOUT_HISTORY_PREFIX: &str = "lockout_history:";

/// Failure counter for an identifier.
pub fn login_attempts(identifier: &str) -> String {
    format!("{LOGIN_ATTEMPTS_PREFIX}{identifier}")
}

/// Failure counter for a client address.
pub fn ip_attempts(address: &str) -> String {
    format!("{IP_ATTEMPTS_PREFIX}{address}")
}

/// Lockout record for an identifier.
pub fn lockout(identifier: &str) -> String {
    format!("{LOCKOUT_PREFIX}{identifier}")
}

/// Block record for a client address.
pub fn ip_blocked(address: &str) -> String {
    format!("{IP_BLOCKED_PREFIX}{address}")
}

/// Rolling 24 hour lockout counter for an identifier.
pub fn lockout_history(identifier: &str) -> String {
    format!("{LOCKOUT_HISTORY_PREFIX}{identifier}")
}

/// Glob pattern matching every key under a prefix.
pub fn pattern(prefix: &str) -> String {
    format!("{prefix}*")
}
