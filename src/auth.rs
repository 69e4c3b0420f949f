//! Password hashing and signed session tokens.
//!
//! Passwords are hashed with bcrypt before they reach the store. Sessions
//! are HS256 JWTs carrying the user's email and stored credential hash,
//! issued at login and carried back in the `token` cookie. Tokens expire
//! one hour after issue; verification checks signature and expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed session lifetime.
const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// One-way salted hash of a plain-text password.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(plain, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(plain, hash)?)
}

/// Payload of a session token. Handlers only consume `email`; the
/// credential hash rides along to mirror the stored login record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub password: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    pub fn issue(&self, email: &str, password_hash: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            email: String::from(email),
            password: String::from(password_hash),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}
