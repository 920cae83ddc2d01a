//! Session tokens and permissions.
//!
//! Tokens are opaque strings checked against a session registry; claims
//! validation (time window) is deterministic and transport-agnostic.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "create-brand").
/// The wildcard permission `"*"` means "allow all".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claims attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal identifier (user/account the session belongs to).
    pub sub: String,
    /// Permissions granted to this session.
    pub permissions: Vec<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// A session valid for 24h from now.
    pub fn new(sub: impl Into<String>, permissions: Vec<Permission>) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            permissions,
            issued_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p.as_str() == permission)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session token")]
    Unknown,
    #[error("session has expired")]
    Expired,
    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,
}

/// Deterministically validate session claims against a point in time.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), SessionError> {
    if now < claims.issued_at {
        return Err(SessionError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(SessionError::Expired);
    }
    Ok(())
}

/// Session lookup abstraction (token -> claims).
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError>;
}

/// In-memory session registry for dev/tests.
#[derive(Debug, Default)]
pub struct InMemorySessionValidator {
    sessions: RwLock<HashMap<String, SessionClaims>>,
}

impl InMemorySessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, claims: SessionClaims) {
        if let Ok(mut map) = self.sessions.write() {
            map.insert(token.into(), claims);
        }
    }

    pub fn revoke(&self, token: &str) {
        if let Ok(mut map) = self.sessions.write() {
            map.remove(token);
        }
    }
}

impl SessionValidator for InMemorySessionValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let claims = {
            let map = self
                .sessions
                .read()
                .map_err(|_| SessionError::Unknown)?;
            map.get(token).cloned().ok_or(SessionError::Unknown)?
        };
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(perms: &[&'static str]) -> SessionClaims {
        SessionClaims::new("user-1", perms.iter().map(|p| Permission::new(*p)).collect())
    }

    #[test]
    fn registered_token_validates() {
        let sessions = InMemorySessionValidator::new();
        sessions.register("tok", claims(&["list-brand"]));

        let validated = sessions.validate("tok", Utc::now()).unwrap();
        assert_eq!(validated.sub, "user-1");
        assert!(validated.grants("list-brand"));
        assert!(!validated.grants("create-brand"));
    }

    #[test]
    fn unknown_and_revoked_tokens_are_rejected() {
        let sessions = InMemorySessionValidator::new();
        assert_eq!(
            sessions.validate("nope", Utc::now()),
            Err(SessionError::Unknown)
        );

        sessions.register("tok", claims(&[]));
        sessions.revoke("tok");
        assert_eq!(
            sessions.validate("tok", Utc::now()),
            Err(SessionError::Unknown)
        );
    }

    #[test]
    fn expired_session_is_rejected() {
        let sessions = InMemorySessionValidator::new();
        let mut c = claims(&["*"]);
        c.expires_at = c.issued_at;
        sessions.register("tok", c);

        assert_eq!(
            sessions.validate("tok", Utc::now()),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn wildcard_grants_everything() {
        let c = claims(&["*"]);
        assert!(c.grants("create-brand"));
        assert!(c.grants("delete-brand"));
    }
}
