//! Test doubles for the auth capabilities.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    password::{CredentialHasher, HashError},
    repo::{InMemoryUserStore, StoreError, UserStore},
    repo_types::User,
    services::AuthService,
    token::{Claims, JwtIssuer, TokenError, TokenIssuer},
};

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_ISSUER: &str = "test-issuer";

/// Cheap reversible stand-in for Argon2 so tests stay fast.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plain: &str) -> Result<String, HashError> {
        Ok(format!("plain${}", plain.chars().rev().collect::<String>()))
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        self.hash(plain).map(|h| h == hash).unwrap_or(false)
    }
}

/// `PlainHasher` that counts verify calls.
#[derive(Default)]
pub struct CountingHasher {
    verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn verifies(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, plain: &str) -> Result<String, HashError> {
        PlainHasher.hash(plain)
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        PlainHasher.verify(hash, plain)
    }
}

/// Hasher whose `hash` always fails.
pub struct FailingHasher;

impl CredentialHasher for FailingHasher {
    fn hash(&self, _plain: &str) -> Result<String, HashError> {
        Err(HashError("entropy source unavailable".into()))
    }

    fn verify(&self, _hash: &str, _plain: &str) -> bool {
        false
    }
}

/// Issuer that can never sign.
pub struct FailingIssuer;

impl TokenIssuer for FailingIssuer {
    fn issue(
        &self,
        _subject: &str,
        _ttl: Duration,
        _extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        Err(TokenError::Encode(
            jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into(),
        ))
    }
}

/// Wraps the in-memory store and counts calls.
pub struct CountingStore {
    inner: InMemoryUserStore,
    creates: AtomicUsize,
    lookups: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryUserStore) -> Self {
        Self {
            inner,
            creates: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryUserStore {
        &self.inner
    }
}

#[async_trait]
impl UserStore for CountingStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email).await
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.inner.update(user).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

/// Lookup never sees the user but the insert loses the race on the unique
/// constraint, as when another request registered the same email in between.
#[derive(Default)]
pub struct RacingStore {
    creates: AtomicUsize,
}

impl RacingStore {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for RacingStore {
    async fn create(&self, _user: &User) -> Result<(), StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::UniqueViolation)
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn update(&self, _user: &User) -> Result<(), StoreError> {
        Err(StoreError::UniqueViolation)
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Delays every lookup before delegating to a counting store.
pub struct SlowStore {
    pub inner: Arc<CountingStore>,
    pub delay: Duration,
}

#[async_trait]
impl UserStore for SlowStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.inner.create(user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_email(email).await
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.inner.update(user).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

/// Every call fails as if the database were unreachable.
pub struct FailingStore;

#[async_trait]
impl UserStore for FailingStore {
    async fn create(&self, _user: &User) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn update(&self, _user: &User) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

pub fn service_with(store: Arc<dyn UserStore>) -> AuthService {
    AuthService::new(store, Arc::new(PlainHasher), test_issuer())
}

pub fn test_issuer() -> Arc<dyn TokenIssuer> {
    Arc::new(JwtIssuer::new(TEST_SECRET, TEST_ISSUER))
}

pub fn decode_token(token: &str) -> Claims {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TEST_ISSUER]);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
        &validation,
    )
    .expect("token should verify")
    .claims
}
