//! Bearer-token session layer for the `/me/*` endpoints. Username/password
//! verification itself (PAM in the original deployment) is an external
//! collaborator and out of scope here; `AuthBackend` is the seam a real
//! deployment plugs a PAM (or LDAP, or local-passwd) check into.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::CaptainError;
use crate::state::{AppState, TokenInfo};

pub trait AuthBackend: Send + Sync {
    /// Returns the numeric user id on success.
    fn authenticate(&self, username: &str, password: &str) -> Option<u64>;
}

/// Always denies. Present so the `/login` contract and the `/me/*` bearer
/// plumbing exist and can be exercised end-to-end without a real identity
/// provider wired in.
pub struct NullAuthBackend;

impl AuthBackend for NullAuthBackend {
    fn authenticate(&self, _username: &str, _password: &str) -> Option<u64> {
        None
    }
}

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate_token(uid: u64) -> String {
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = DefaultHasher::new();
    uid.hash(&mut hasher);
    counter.hash(&mut hasher);
    fleet_core::now_secs().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    format!("{:016x}{counter:08x}", hasher.finish())
}

/// Extracts and validates the bearer token, yielding the authenticated uid.
pub struct AuthenticatedUser(pub u64);

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = CaptainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CaptainError::Unauthorized("missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| CaptainError::Unauthorized("expected Bearer token".into()))?;

        let now = fleet_core::now_secs();
        let mut tokens = state.tokens.lock().expect("token map poisoned");
        match tokens.get(token) {
            Some(TokenInfo { uid, expires_at }) if *expires_at > now => Ok(AuthenticatedUser(*uid)),
            Some(_) => {
                tokens.remove(token);
                Err(CaptainError::Unauthorized("token expired".into()))
            }
            None => Err(CaptainError::Unauthorized("unknown token".into())),
        }
    }
}
