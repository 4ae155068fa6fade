//! User Repositories
//!
//! Storage seam for user records. Both implementations enforce the unique
//! email constraint at their own serialization point and keep the password
//! hash out of every read except [`UserRepository::find_credentials_by_email`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{FieldError, UserError, UserResult, ValidationReport};
use super::prepare::PreparedWrite;
use super::types::{UserRecord, UserType};
use crate::db;

/// A record together with its stored password hash.
#[derive(Clone)]
pub struct Credentials {
    pub user: UserRecord,
    pub password_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password_hash", &"[redacted]")
            .finish()
    }
}

/// Persistence operations for user records.
///
/// Emails passed to lookups must already be normalized.
pub trait UserRepository: Send + Sync {
    /// Insert a new record. The write must carry a password hash.
    fn insert(&self, write: PreparedWrite) -> impl Future<Output = UserResult<UserRecord>> + Send;

    /// Replace an existing record, keeping the stored hash unless the write carries one.
    fn update(&self, write: PreparedWrite) -> impl Future<Output = UserResult<UserRecord>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = UserResult<Option<UserRecord>>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = UserResult<Option<UserRecord>>> + Send;

    /// The only read that returns the password hash.
    fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = UserResult<Option<Credentials>>> + Send;

    fn find_by_type(
        &self,
        user_type: UserType,
    ) -> impl Future<Output = UserResult<Vec<UserRecord>>> + Send;

    fn find_active(&self) -> impl Future<Output = UserResult<Vec<UserRecord>>> + Send;

    /// Number of records per role, in role declaration order.
    fn count_by_type(&self) -> impl Future<Output = UserResult<Vec<(UserType, i64)>>> + Send;
}

fn missing_password() -> UserError {
    UserError::Invalid(ValidationReport::single(
        "password",
        FieldError::MissingField {
            field: "password".into(),
        },
    ))
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Repository backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique violation to the field it protects.
fn map_write_error(err: sqlx::Error) -> UserError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_pkey") => "id",
                _ => "email",
            };
            warn!(field, "Unique constraint violated on user write");
            return UserError::DuplicateKey { field };
        }
    }
    UserError::Database(err)
}

impl UserRepository for PgUserRepository {
    async fn insert(&self, write: PreparedWrite) -> UserResult<UserRecord> {
        let hash = write.password_hash.as_deref().ok_or_else(missing_password)?;
        let row = db::insert_user(&self.pool, &write.record, hash)
            .await
            .map_err(map_write_error)?;
        Ok(row.into())
    }

    async fn update(&self, write: PreparedWrite) -> UserResult<UserRecord> {
        let row = db::update_user(&self.pool, &write.record, write.password_hash.as_deref())
            .await
            .map_err(map_write_error)?
            .ok_or(UserError::NotFound)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<UserRecord>> {
        Ok(db::find_user_by_id(&self.pool, id).await?.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<UserRecord>> {
        Ok(db::find_user_by_email(&self.pool, email)
            .await?
            .map(Into::into))
    }

    async fn find_credentials_by_email(&self, email: &str) -> UserResult<Option<Credentials>> {
        Ok(db::find_credentials_by_email(&self.pool, email)
            .await?
            .map(|row| Credentials {
                user: row.user.into(),
                password_hash: row.password_hash,
            }))
    }

    async fn find_by_type(&self, user_type: UserType) -> UserResult<Vec<UserRecord>> {
        let rows = db::find_users_by_type(&self.pool, user_type).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_active(&self) -> UserResult<Vec<UserRecord>> {
        let rows = db::find_active_users(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_type(&self) -> UserResult<Vec<(UserType, i64)>> {
        Ok(db::count_users_by_type(&self.pool).await?)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug)]
struct StoredUser {
    record: UserRecord,
    password_hash: String,
}

/// Rows plus the email, role and active indexes. Ids are UUIDv7, so the
/// sets iterate roughly in creation order.
#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<Uuid, StoredUser>,
    by_email: HashMap<String, Uuid>,
    by_type: BTreeMap<UserType, BTreeSet<Uuid>>,
    active: BTreeSet<Uuid>,
}

impl Tables {
    fn index(&mut self, record: &UserRecord) {
        self.by_email.insert(record.email.clone(), record.id);
        self.by_type
            .entry(record.user_type())
            .or_default()
            .insert(record.id);
        if record.status.is_active {
            self.active.insert(record.id);
        }
    }

    fn unindex(&mut self, record: &UserRecord) {
        self.by_email.remove(&record.email);
        if let Some(ids) = self.by_type.get_mut(&record.user_type()) {
            ids.remove(&record.id);
        }
        self.active.remove(&record.id);
    }

    fn collect<'a>(&self, ids: impl IntoIterator<Item = &'a Uuid>) -> Vec<UserRecord> {
        ids.into_iter()
            .filter_map(|id| self.rows.get(id))
            .map(|stored| stored.record.clone())
            .collect()
    }
}

/// Repository held in process memory. One lock guards rows and indexes, so
/// the email check and the insert are atomic.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    tables: RwLock<Tables>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored hash for a record. Test and diagnostics helper.
    pub async fn stored_password_hash(&self, id: Uuid) -> Option<String> {
        let tables = self.tables.read().await;
        tables.rows.get(&id).map(|s| s.password_hash.clone())
    }
}

impl UserRepository for MemoryUserRepository {
    async fn insert(&self, write: PreparedWrite) -> UserResult<UserRecord> {
        let PreparedWrite {
            mut record,
            password_hash,
        } = write;
        let password_hash = password_hash.ok_or_else(missing_password)?;

        let mut tables = self.tables.write().await;
        if tables.by_email.contains_key(&record.email) {
            return Err(UserError::DuplicateKey { field: "email" });
        }
        if tables.rows.contains_key(&record.id) {
            return Err(UserError::DuplicateKey { field: "id" });
        }

        let now = Utc::now();
        record.created_at = now;
        record.updated_at = now;
        tables.index(&record);
        tables.rows.insert(
            record.id,
            StoredUser {
                record: record.clone(),
                password_hash,
            },
        );

        debug!(user_id = %record.id, "User inserted");
        Ok(record)
    }

    async fn update(&self, write: PreparedWrite) -> UserResult<UserRecord> {
        let PreparedWrite {
            mut record,
            password_hash,
        } = write;

        let mut tables = self.tables.write().await;
        if let Some(owner) = tables.by_email.get(&record.email) {
            if *owner != record.id {
                return Err(UserError::DuplicateKey { field: "email" });
            }
        }
        let Some(existing) = tables.rows.remove(&record.id) else {
            return Err(UserError::NotFound);
        };

        // Role and creation time are fixed at insert.
        if record.user_type() != existing.record.user_type() {
            record.role = existing.record.role.clone();
        }
        record.created_at = existing.record.created_at;
        record.updated_at = Utc::now();

        tables.unindex(&existing.record);
        tables.index(&record);
        tables.rows.insert(
            record.id,
            StoredUser {
                record: record.clone(),
                password_hash: password_hash.unwrap_or(existing.password_hash),
            },
        );

        debug!(user_id = %record.id, "User updated");
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(&id).map(|s| s.record.clone()))
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.rows.get(id))
            .map(|s| s.record.clone()))
    }

    async fn find_credentials_by_email(&self, email: &str) -> UserResult<Option<Credentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.rows.get(id))
            .map(|s| Credentials {
                user: s.record.clone(),
                password_hash: s.password_hash.clone(),
            }))
    }

    async fn find_by_type(&self, user_type: UserType) -> UserResult<Vec<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_type
            .get(&user_type)
            .map(|ids| tables.collect(ids))
            .unwrap_or_default())
    }

    async fn find_active(&self) -> UserResult<Vec<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.collect(&tables.active))
    }

    async fn count_by_type(&self) -> UserResult<Vec<(UserType, i64)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_type
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(user_type, ids)| (*user_type, ids.len() as i64))
            .collect())
    }
}
