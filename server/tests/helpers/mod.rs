//! Reusable test helpers for user integration tests.
//!
//! Builds a [`UserService`] over the in-memory repository with a cheap
//! Argon2 configuration, so tests run without a database.
#![allow(dead_code)]

use learnhub_server::config::Config;
use learnhub_server::users::{
    Argon2Hasher, MemoryUserRepository, NewUser, UserRecord, UserService,
};

pub type TestService = UserService<MemoryUserRepository, Argon2Hasher>;

/// Service with an empty in-memory store.
pub fn service() -> TestService {
    let hasher = Argon2Hasher::from_config(&Config::default_for_test())
        .expect("test Argon2 params are valid");
    UserService::new(MemoryUserRepository::new(), hasher)
}

/// Registration input with a valid password.
pub fn new_user(first: &str, last: &str, email: &str, user_type: &str) -> NewUser {
    NewUser::new(first, last, email, "secret1", user_type)
}

/// Register a user, panicking on failure.
pub async fn register(svc: &TestService, email: &str, user_type: &str) -> UserRecord {
    svc.register(new_user("Test", "User", email, user_type), None)
        .await
        .expect("registration should succeed")
}
