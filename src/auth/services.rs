use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
    error::AuthError,
    password::{CredentialHasher, HashError},
    repo::{StoreError, UserStore},
    repo_types::User,
    token::TokenIssuer,
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

const DECOY_PASSWORD: &str = "decoy-password-for-unknown-emails";

/// Registration and login rules. The store is the single source of truth for
/// users; the only thing cached here is the decoy digest verified against
/// when a login names an unknown email.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    issuer: Arc<dyn TokenIssuer>,
    decoy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            decoy_hash: OnceCell::new(),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterRequest) -> Result<PublicUser, AuthError> {
        let email = normalize_email(&input.email);
        let first_name = input.first_name.trim().to_owned();
        let last_name = input
            .last_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        if email.is_empty() || first_name.is_empty() || input.password.is_empty() {
            warn!("register missing fields");
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::InvalidEmailFormat);
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AuthError::PasswordTooShort(MIN_PASSWORD_LEN));
        }

        // Early exit only; the unique constraint on create decides.
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(input.password).await?;

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            first_name,
            last_name,
            created_at: now,
            updated_at: now,
        };

        match self.store.create(&user).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation) => {
                warn!(email = %user.email, "email registered concurrently");
                return Err(AuthError::EmailTaken);
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(e.into());
            }
        }

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(PublicUser::from(&user))
    }

    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginRequest) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&input.email);

        if email.is_empty() || input.password.is_empty() {
            warn!("login missing fields");
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::InvalidEmailFormat);
        }

        let user = match self.store.find_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                self.burn_verify(input.password).await;
                return Err(AuthError::InvalidLogin);
            }
        };

        if !self
            .verify_password(user.password_hash.clone(), input.password)
            .await?
        {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidLogin);
        }

        let access_token = self
            .issuer
            .issue(&user.id.to_string(), ACCESS_TOKEN_TTL, token_claims(&user))
            .map_err(|e| {
                error!(error = %e, "jwt sign failed");
                AuthError::from(e)
            })?;

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            access_token,
            user: PublicUser::from(&user),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let id = Uuid::parse_str(user_id).map_err(|e| {
            warn!(error = %e, "malformed user id");
            AuthError::from(e)
        })?;
        self.store.delete(id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn hash_password(&self, plain: String) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| HashError(e.to_string()))??;
        Ok(hash)
    }

    /// Spends one verify on a decoy digest so an unknown email costs as much
    /// as a wrong password. The outcome is ignored.
    async fn burn_verify(&self, plain: String) {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| self.hash_password(DECOY_PASSWORD.to_owned()))
            .await;
        match decoy {
            Ok(hash) => {
                let _ = self.verify_password(hash.clone(), plain).await;
            }
            Err(e) => debug!(error = %e, "decoy hash unavailable"),
        }
    }

    async fn verify_password(&self, hash: String, plain: String) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&hash, &plain))
            .await
            .map_err(|e| HashError(e.to_string()))?;
        Ok(ok)
    }
}

fn token_claims(user: &User) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("email".into(), Value::from(user.email.clone()));
    claims.insert("first_name".into(), Value::from(user.first_name.clone()));
    claims.insert(
        "last_name".into(),
        user.last_name.clone().map(Value::from).unwrap_or(Value::Null),
    );
    claims
}
