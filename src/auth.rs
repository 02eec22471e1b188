use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Identity of an authenticated principal, as supplied by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Authentication collaborator: resolves a bearer token to a user identity
/// or rejects the caller as unauthenticated.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: i64,
}

/// Validates HS256 tokens issued by the auth service.
pub struct JwtAuthProvider {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AppError::Unauthenticated)?;
        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthenticated)?;
        Ok(AuthUser {
            id,
            username: data.claims.username,
        })
    }
}

/// Extracts the bearer token and stores the resolved `AuthUser` in request
/// extensions for the REST handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthenticated)?;

    let user = state.auth.authenticate(token).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue(secret: &str, sub: &str, username: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let id = Uuid::new_v4();
        let provider = JwtAuthProvider::new("secret");
        let token = issue("secret", &id.to_string(), "alice");

        let user = provider.authenticate(&token).await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthenticated() {
        let provider = JwtAuthProvider::new("secret");
        let token = issue("other", &Uuid::new_v4().to_string(), "alice");
        assert!(matches!(
            provider.authenticate(&token).await,
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn non_uuid_subject_is_rejected() {
        let provider = JwtAuthProvider::new("secret");
        let token = issue("secret", "not-a-uuid", "alice");
        assert!(matches!(
            provider.authenticate(&token).await,
            Err(AppError::Unauthenticated)
        ));
    }
}
