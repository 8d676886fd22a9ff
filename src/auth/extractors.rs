use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::warn;
use uuid::Uuid;

use super::claims::Claims;
use crate::{config::JwtConfig, error::AppError, state::AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl AuthUser {
    /// Display name derived from the email's local part.
    pub fn username(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|u| !u.is_empty())
    }
}

/// Caller identity; `None` when no `Authorization` header was sent.
/// Anonymous submissions are allowed, but a bad token is still rejected.
pub struct MaybeUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(MaybeUser(None));
        };
        let auth = auth
            .to_str()
            .map_err(|_| AppError::Unauthorized("invalid Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("invalid auth scheme".into()))?;

        let claims = verify(token, &state.config.jwt).map_err(|e| {
            warn!(error = %e, "rejected access token");
            AppError::Unauthorized("invalid or expired token".into())
        })?;

        Ok(MaybeUser(Some(AuthUser {
            id: claims.sub,
            email: claims.email,
        })))
    }
}

pub fn verify(token: &str, cfg: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_audience(std::slice::from_ref(&cfg.audience));
    let decoding = DecodingKey::from_secret(cfg.secret.as_bytes());
    Ok(decode::<Claims>(token, &decoding, &validation)?.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn cfg() -> JwtConfig {
        JwtConfig {
            secret: "dev-secret".into(),
            audience: "authenticated".into(),
        }
    }

    fn token(secret: &str, aud: &str, ttl_secs: i64) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let claims = Claims {
            sub: id,
            exp: (OffsetDateTime::now_utc().unix_timestamp() + ttl_secs) as usize,
            aud: aud.into(),
            email: Some("pixel.chef@example.com".into()),
        };
        let t = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (id, t)
    }

    #[test]
    fn verifies_valid_token() {
        let (id, t) = token("dev-secret", "authenticated", 600);
        let claims = verify(&t, &cfg()).expect("valid");
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email.as_deref(), Some("pixel.chef@example.com"));
    }

    #[test]
    fn rejects_wrong_secret_audience_or_expired() {
        let (_, t) = token("other-secret", "authenticated", 600);
        assert!(verify(&t, &cfg()).is_err());
        let (_, t) = token("dev-secret", "anon", 600);
        assert!(verify(&t, &cfg()).is_err());
        let (_, t) = token("dev-secret", "authenticated", -3600);
        assert!(verify(&t, &cfg()).is_err());
    }

    #[test]
    fn username_is_email_local_part() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("pixel.chef@example.com".into()),
        };
        assert_eq!(user.username(), Some("pixel.chef"));
        let anon = AuthUser {
            id: Uuid::new_v4(),
            email: None,
        };
        assert_eq!(anon.username(), None);
    }
}
