//! Admin authentication.
//!
//! A single admin account is configured statically. Logging in with its
//! credentials yields an HS256 JWT that the `require_admin` middleware checks
//! on every mutating route.
//!
//! - Passwords are stored as Argon2id PHC strings; a plain configured
//!   password is hashed once at startup
//! - Tokens carry `sub`, `role`, `iat` and `exp`; expiry is always enforced

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use coursecat_api::ApiError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AuthConfig;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("admin authentication is disabled")]
    Disabled,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("auth configuration error: {0}")]
    Config(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidToken(_) => ApiError::unauthorized(err.to_string()),
            AuthError::Disabled => ApiError::not_found(err.to_string()),
            AuthError::Hashing(_) | AuthError::Config(_) => {
                tracing::error!(error = %err, "admin authentication failure");
                ApiError::internal("Authentication unavailable")
            }
        }
    }
}

/// JWT claims of an admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Login response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a PHC string. Errors only on a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

struct Credentials {
    username: String,
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: u64,
}

/// Issues and verifies admin tokens. `None` credentials means auth is disabled.
pub struct AdminAuth {
    credentials: Option<Credentials>,
}

impl AdminAuth {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        if !config.enabled {
            tracing::warn!("admin authentication is disabled; mutating routes are open");
            return Ok(Self::disabled());
        }
        config.validate().map_err(AuthError::Config)?;

        let password_hash = match (&config.admin_password_hash, &config.admin_password) {
            (Some(hash), _) if !hash.trim().is_empty() => {
                PasswordHash::new(hash.trim())
                    .map_err(|e| AuthError::Config(format!("admin_password_hash: {e}")))?;
                hash.trim().to_string()
            }
            (_, Some(password)) => hash_password(password)?,
            _ => return Err(AuthError::Config("no admin password configured".into())),
        };
        let secret = config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AuthError::Config("jwt_secret is required".into()))?;

        Ok(Self {
            credentials: Some(Credentials {
                username: config.admin_username.trim().to_string(),
                password_hash,
                encoding_key: EncodingKey::from_secret(secret.as_bytes()),
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                token_ttl_secs: config.token_ttl_secs,
            }),
        })
    }

    pub fn disabled() -> Self {
        Self { credentials: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Checks the credentials and issues a token. CPU bound (Argon2).
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let creds = self.credentials.as_ref().ok_or(AuthError::Disabled)?;

        // Verify even on a wrong username so both failures cost the same.
        let password_ok = verify_password(password, &creds.password_hash)?;
        if username.trim() != creds.username || !password_ok {
            tracing::info!(username = %username, "admin login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AdminClaims {
            sub: creds.username.clone(),
            role: ADMIN_ROLE.to_string(),
            iat,
            exp: iat + creds.token_ttl_secs as i64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &creds.encoding_key)
            .map_err(|e| AuthError::Config(e.to_string()))?;

        tracing::info!(username = %creds.username, "admin token issued");
        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: creds.token_ttl_secs,
        })
    }

    /// Verifies a token and returns its claims.
    ///
    /// When auth is disabled every caller is treated as the admin.
    pub fn verify(&self, token: Option<&str>) -> Result<AdminClaims, AuthError> {
        let Some(creds) = self.credentials.as_ref() else {
            return Ok(AdminClaims {
                sub: "anonymous".to_string(),
                role: ADMIN_ROLE.to_string(),
                iat: 0,
                exp: 0,
            });
        };
        let token = token.ok_or(AuthError::MissingToken)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<AdminClaims>(token, &creds.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        if data.claims.role != ADMIN_ROLE || data.claims.sub != creds.username {
            return Err(AuthError::InvalidToken("not an admin token".into()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            admin_password: Some("s3cret-pass".into()),
            jwt_secret: Some("unit-test-secret-0123456789".into()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
        assert!(verify_password("hunter2", "not-a-hash").is_err());
    }

    #[test]
    fn login_then_verify() {
        let auth = AdminAuth::from_config(&config()).unwrap();
        let issued = auth.login("admin", "s3cret-pass").unwrap();
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);

        let claims = auth.verify(Some(&issued.token)).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_credentials_are_rejected() {
        let auth = AdminAuth::from_config(&config()).unwrap();
        assert!(matches!(
            auth.login("admin", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("root", "s3cret-pass"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn tampered_and_foreign_tokens_are_rejected() {
        let auth = AdminAuth::from_config(&config()).unwrap();
        let token = auth.login("admin", "s3cret-pass").unwrap().token;
        let tampered = format!("{token}x");
        assert!(matches!(
            auth.verify(Some(&tampered)),
            Err(AuthError::InvalidToken(_))
        ));

        let mut other = config();
        other.jwt_secret = Some("another-secret-0123456789".into());
        let other = AdminAuth::from_config(&other).unwrap();
        assert!(matches!(
            other.verify(Some(&token)),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(auth.verify(None), Err(AuthError::MissingToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AdminAuth::from_config(&config()).unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AdminClaims {
            sub: "admin".into(),
            role: ADMIN_ROLE.into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret-0123456789"),
        )
        .unwrap();
        assert!(matches!(
            auth.verify(Some(&token)),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn preconfigured_hash_is_used() {
        let mut cfg = config();
        cfg.admin_password = None;
        cfg.admin_password_hash = Some(hash_password("from-hash").unwrap());
        let auth = AdminAuth::from_config(&cfg).unwrap();
        assert!(auth.login("admin", "from-hash").is_ok());

        cfg.admin_password_hash = Some("garbage".into());
        assert!(matches!(
            AdminAuth::from_config(&cfg),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn disabled_auth_admits_everyone() {
        let auth = AdminAuth::disabled();
        assert!(!auth.is_enabled());
        assert_eq!(auth.verify(None).unwrap().role, ADMIN_ROLE);
        assert!(matches!(auth.login("a", "b"), Err(AuthError::Disabled)));
    }
}
