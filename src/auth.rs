use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::err::{proceeds, Error, Payload};
use crate::handlers::within;
use crate::models::{StudentLogin, TokenPair};
use crate::state::AppState;

pub const STUDENT_ROLE: &str = "student";

/// PBKDF2-SHA256 password hashing with a configurable round count.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Passwords {
    pub fn new(rounds: u32) -> Self {
        Self {
            params: Params {
                rounds,
                ..Params::default()
            },
        }
    }

    pub fn hash(&self, plain: &str) -> Result<String, pbkdf2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Pbkdf2.hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)?;
        Ok(hash.to_string())
    }

    /// A stored value that is not a PHC hash never matches.
    pub fn verify(&self, plain: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(hash) => Pbkdf2.verify_password(plain.as_bytes(), &hash).is_ok(),
            Err(_) => false,
        }
    }
}

/// Hashes on the blocking pool; a full round count takes long enough to
/// stall the reactor otherwise.
pub async fn hash_password(passwords: Arc<Passwords>, plain: String) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || passwords.hash(&plain))
        .await
        .map_err(|err| Error::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        })?
        .map_err(Error::from)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub user_role: String,
    pub token_type: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs HS256 access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    #[cfg(test)]
    decoding: jsonwebtoken::DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            #[cfg(test)]
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
            issuer: config.service_name.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        role: &str,
    ) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        Ok(TokenPair {
            access_token: self.sign(user_id, role, "access", self.access_ttl)?,
            refresh_token: self.sign(user_id, role, "refresh", self.refresh_ttl)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = jsonwebtoken::Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }

    fn sign(
        &self,
        user_id: Uuid,
        role: &str,
        token_type: &str,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            user_role: role.to_string(),
            token_type: token_type.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

/// Rejects requests without a non-empty `Authorization` header. The value
/// itself is not checked.
pub async fn require_authorization(request: Request, next: Next) -> Result<Response, Error> {
    let present = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| !value.trim().is_empty());
    if !present {
        return Err(Error::MissingCredentials {
            message: "`Authorization` header is missing".to_string(),
        });
    }
    Ok(next.run(request).await)
}

pub async fn login_student(
    Extension(state): Extension<AppState>,
    body: Result<Json<StudentLogin>, JsonRejection>,
) -> Payload<TokenPair> {
    let Json(login) = body?;
    let tokens = within(
        state.timeout,
        state.services.auth().student_login(&login.login, &login.password),
    )
    .await?;
    proceeds("logged in successfully", tokens)
}
