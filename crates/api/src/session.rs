//! Request sessions.
//!
//! A bearer token is resolved to a user by an injectable [`SessionResolver`];
//! the user record then supplies the role and must still be active. Tokens
//! are issued elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;
use document_store::DocumentStore;
use domain::{Caller, Role};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves bearer tokens to users.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<UserId>;
}

/// Token table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessions {
    tokens: Arc<Mutex<HashMap<String, UserId>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, user_id: UserId) {
        self.lock().insert(token.into(), user_id);
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserId>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionResolver for InMemorySessions {
    async fn resolve(&self, token: &str) -> Option<UserId> {
        self.lock().get(token).copied()
    }
}

/// The signed-in user of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            is_admin: self.is_admin(),
        }
    }
}

/// A session whose user is an admin.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession(pub Session);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Some)
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))
}

async fn resolve<S: DocumentStore>(state: &AppState<S>, token: &str) -> Result<Session, ApiError> {
    let user_id = state
        .sessions
        .resolve(token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".to_string()))?;
    let user = state
        .users
        .find(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".to_string()))?;
    if !user.active {
        return Err(ApiError::Unauthorized("account is deactivated".to_string()));
    }
    Ok(Session {
        user_id,
        role: user.role,
    })
}

impl<S> FromRequestParts<Arc<AppState<S>>> for Session
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;
        resolve(state, token).await
    }
}

impl<S> OptionalFromRequestParts<Arc<AppState<S>>> for Session
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => resolve(state, token).await.map(Some),
            None => Ok(None),
        }
    }
}

impl<S> FromRequestParts<Arc<AppState<S>>> for AdminSession
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let session = <Session as FromRequestParts<_>>::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            return Err(ApiError::Forbidden("admin access required".to_string()));
        }
        Ok(AdminSession(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(None)).unwrap(), None);
        assert_eq!(
            bearer_token(&parts(Some("Bearer abc123"))).unwrap(),
            Some("abc123")
        );
        assert!(bearer_token(&parts(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer   "))).is_err());
    }

    #[tokio::test]
    async fn in_memory_sessions_resolve_and_revoke() {
        let sessions = InMemorySessions::new();
        let user = UserId::new();
        sessions.insert("t1", user);

        assert_eq!(sessions.resolve("t1").await, Some(user));
        assert!(sessions.revoke("t1"));
        assert_eq!(sessions.resolve("t1").await, None);
    }
}
