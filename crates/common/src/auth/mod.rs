//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT validation for access tokens issued by the identity provider
//! - Session extractors for axum handlers
//! - The `Actor` capability passed into every workflow decision

use crate::db::models::{Profile, UserType};
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Who is acting, and with which role.
///
/// Built from the caller's profile and handed explicitly to the transition
/// authority; nothing in the workflow reads session state on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub profile_id: Uuid,
    pub role: UserType,
}

impl Actor {
    pub fn new(profile_id: Uuid, role: UserType) -> Self {
        Self { profile_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserType::Admin
    }

    /// Whether `author_id` is this actor's profile
    pub fn owns(&self, author_id: Uuid) -> bool {
        self.profile_id == author_id
    }

    /// Fail unless the actor is an administrator
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::AdminRequired)
        }
    }
}

impl From<&Profile> for Actor {
    fn from(profile: &Profile) -> Self {
        Self::new(profile.id, profile.user_type)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (identity-provider user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, email: Option<String>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            email,
            aud: self.validation.aud.as_ref().and_then(|a| a.iter().next().cloned()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// An authenticated caller (token verified, profile not yet loaded)
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Session {
    fn from_parts(parts: &Parts, jwt: &JwtManager) -> Result<Option<Self>> {
        let Some(header) = parts.headers.get("authorization") else {
            return Ok(None);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(extract_bearer)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authorization header must be a bearer token".to_string(),
            })?;

        let claims = jwt.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(Some(Session {
            user_id,
            email: claims.email,
        }))
    }
}

/// Axum extractor for a required session
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let jwt = Arc::<JwtManager>::from_ref(state);
        Session::from_parts(parts, &jwt)?.ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })
    }
}

/// Optional session: anonymous when no Authorization header is sent,
/// rejected when one is sent but does not verify.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let jwt = Arc::<JwtManager>::from_ref(state);
        Ok(MaybeSession(Session::from_parts(parts, &jwt)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/publications");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600, None);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, Some("ada@example.org".to_string()))
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("ada@example.org"));
    }

    #[test]
    fn test_jwt_audience_enforced() {
        let issuer = JwtManager::new("test_secret", 3600, Some("authenticated"));
        let token = issuer.generate_token(Uuid::new_v4(), None).unwrap();
        assert!(issuer.validate_token(&token).is_ok());

        let strict = JwtManager::new("test_secret", 3600, Some("service_role"));
        assert!(matches!(strict.validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let issuer = JwtManager::new("secret_a", 3600, None);
        let verifier = JwtManager::new("secret_b", 3600, None);
        let token = issuer.generate_token(Uuid::new_v4(), None).unwrap();
        assert!(matches!(verifier.validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_session_from_parts() {
        let jwt = JwtManager::new("test_secret", 3600, None);
        let user_id = Uuid::new_v4();
        let token = jwt.generate_token(user_id, None).unwrap();

        let session = Session::from_parts(&parts_with(Some(&format!("Bearer {token}"))), &jwt)
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user_id);

        assert!(Session::from_parts(&parts_with(None), &jwt).unwrap().is_none());
        assert!(Session::from_parts(&parts_with(Some("Bearer nope")), &jwt).is_err());
        assert!(Session::from_parts(&parts_with(Some("Token x")), &jwt).is_err());
    }

    #[test]
    fn test_actor_roles() {
        let admin = Actor::new(Uuid::new_v4(), UserType::Admin);
        let author = Actor::new(Uuid::new_v4(), UserType::Standard);
        assert!(admin.require_admin().is_ok());
        assert!(matches!(author.require_admin(), Err(AppError::AdminRequired)));
        assert!(author.owns(author.profile_id));
        assert!(!admin.owns(author.profile_id));
    }
}
