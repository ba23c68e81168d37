//! Bearer session tokens. A token names the user and the role they held when they signed in;
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extraction re-reads the account so a
//! deactivated user loses access before the token expires.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::users::{CurrentUser, Role},
    config::Config,
    errors::Error,
    types::UserId,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

fn signing_secret(config: &Config) -> Result<&[u8], Error> {
    config
        .secret_key
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| Error::Internal {
            operation: "sign sessions: secret_key is not configured".to_string(),
        })
}

pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let issued = Utc::now();
    let claims = SessionClaims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        exp: (issued + config.auth.security.jwt_expiry).timestamp(),
        iat: issued.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(signing_secret(config)?)).map_err(|e| Error::Internal {
        operation: format!("sign session token: {e}"),
    })
}

/// Anything wrong with the token itself is the caller's problem (401); key or codec failures are ours.
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(signing_secret(config)?);

    match decode::<SessionClaims>(token, &key, &Validation::default()) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_) => Err(Error::Unauthenticated { message: None }),
            _ => Err(Error::Internal {
                operation: format!("verify session token: {e}"),
            }),
        },
    }
}
