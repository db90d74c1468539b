use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::User;
use crate::store::UserStore;
use crate::AppState;

/// Claims issued by the identity provider. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verifies HS256 bearer tokens signed with the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("rejected bearer token: {}", e);
                AppError::Unauthorized
            })
    }
}

/// Authenticated caller. The core trusts `user_id` from here on.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let claims = state.tokens.verify(token)?;
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser { user_id: claims.sub })
    }
}

/// Authenticated caller whose stored role is `admin`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        match state.store.user(&auth.user_id).await? {
            Some(user) if user.is_admin() => Ok(AdminUser { user }),
            _ => Err(AppError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config() -> JwtConfig {
        JwtConfig { secret: "test-secret".into(), leeway_seconds: 0 }
    }

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_subject() {
        let verifier = TokenVerifier::new(&config());
        let claims = verifier.verify(&token("test-secret", "user_1", 600)).unwrap();
        assert_eq!(claims.sub, "user_1");
    }

    #[test]
    fn wrong_secret_or_expired_token_is_unauthorized() {
        let verifier = TokenVerifier::new(&config());
        assert!(matches!(
            verifier.verify(&token("other", "user_1", 600)),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            verifier.verify(&token("test-secret", "user_1", -600)),
            Err(AppError::Unauthorized)
        ));
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
