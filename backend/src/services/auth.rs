//! Account registration, password hashing and bearer tokens.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::api::{NewUser, RegisterRequest, TokenResponse, User, UserProfile};
use crate::db::repository::{FullRepository, RepositoryError};

pub const TOKEN_TYPE: &str = "bearer";
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

const DUPLICATE_ACCOUNT: &str = "Email or username already registered";
const BAD_LOGIN: &str = "Incorrect username or password";
const BAD_CREDENTIALS: &str = "Could not validate credentials";

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens and owns the account workflows.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_minutes: i64,
}

impl AuthService {
    pub fn new(secret: &str, expire_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes,
        }
    }

    pub fn expire_minutes(&self) -> i64 {
        self.expire_minutes
    }

    /// Sign a token for `username`, valid from `now` for the configured expiry.
    pub fn issue_token(&self, username: &str, now: DateTime<Utc>) -> ServiceResult<String> {
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expire_minutes)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::internal(format!("Failed to sign token: {}", e)))
    }

    /// Return the username carried by a valid, unexpired token.
    pub fn verify_token(&self, token: &str) -> ServiceResult<String> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                log::debug!("Rejected bearer token: {}", e);
                ServiceError::unauthorized(BAD_CREDENTIALS)
            })
    }

    /// Create an account after validating the request.
    pub async fn register<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        request: &RegisterRequest,
    ) -> ServiceResult<UserProfile> {
        let email = request.email.trim();
        let username = request.username.trim();
        validate_email(email)?;
        validate_username(username)?;
        validate_password(&request.password)?;

        if repo
            .find_user_by_email_or_username(email, username)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(DUPLICATE_ACCOUNT));
        }

        let new_user = NewUser {
            email: email.to_string(),
            username: username.to_string(),
            hashed_password: hash_in_background(request.password.clone()).await?,
        };

        let user = match repo.create_user(&new_user).await {
            Ok(user) => user,
            // Lost a race against a concurrent registration.
            Err(RepositoryError::Conflict { .. }) => {
                return Err(ServiceError::validation(DUPLICATE_ACCOUNT))
            }
            Err(e) => return Err(e.into()),
        };

        log::info!("Registered user {} (id {})", user.username, user.id);
        Ok(user.into())
    }

    /// Check credentials and issue an access token.
    pub async fn login<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<TokenResponse> {
        let user = repo.find_user_by_username(username.trim()).await?;
        let hashed = user.as_ref().map(|u| u.hashed_password.clone());
        let matches = verify_in_background(password.to_string(), hashed).await?;
        let user = user
            .filter(|_| matches)
            .ok_or_else(|| ServiceError::unauthorized(BAD_LOGIN))?;

        if !user.is_active {
            return Err(ServiceError::unauthorized("Inactive user"));
        }

        Ok(TokenResponse {
            access_token: self.issue_token(&user.username, now)?,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// Resolve a bearer token to an active user.
    pub async fn authenticate<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        token: &str,
    ) -> ServiceResult<User> {
        let username = self.verify_token(token)?;
        match repo.find_user_by_username(&username).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(ServiceError::unauthorized(BAD_CREDENTIALS)),
        }
    }
}

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ServiceError::internal(format!("Failed to build salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash on the blocking thread pool.
async fn hash_in_background(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::internal(format!("Password hashing task failed: {}", e)))?
}

/// Verify on the blocking thread pool. Unknown users are checked against a decoy
/// hash so they take as long to reject as a wrong password.
async fn verify_in_background(password: String, hashed: Option<String>) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || match hashed {
        Some(hashed) => verify_password(&password, &hashed),
        None => {
            verify_password(&password, decoy_hash());
            false
        }
    })
    .await
    .map_err(|e| ServiceError::internal(format!("Password check task failed: {}", e)))
}

fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("decoy-password").unwrap_or_default())
}

fn validate_email(email: &str) -> ServiceResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::validation("Invalid email address"));
    }
    Ok(())
}

fn validate_username(username: &str) -> ServiceResult<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ServiceError::validation(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ServiceError::validation(
            "Username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
