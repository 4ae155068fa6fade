//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.
//! The default column list never includes `password_hash`; only
//! [`find_credentials_by_email`] reads it.

use sqlx::types::Json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::models::{profile_columns, CredentialsRow, UserRow};
use crate::users::{UserRecord, UserType};

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

/// Columns returned by every default read.
const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, profile_photo, user_type, \
     learner_profile, instructor_profile, is_active, is_email_verified, \
     email_verification_token, email_verification_expire, password_reset_token, \
     password_reset_expire, last_login, login_count, registration_ip, suspended_until, \
     suspension_reason, address, preferences, created_at, updated_at";

// ============================================================================
// Writes
// ============================================================================

/// Insert a new user with an already hashed password.
pub async fn insert_user(
    pool: &PgPool,
    user: &UserRecord,
    password_hash: &str,
) -> sqlx::Result<UserRow> {
    let (learner_profile, instructor_profile) = profile_columns(&user.role);
    let sql = format!(
        r"
        INSERT INTO users (
            id, first_name, last_name, email, password_hash, phone, profile_photo,
            user_type, learner_profile, instructor_profile, is_active, is_email_verified,
            email_verification_token, email_verification_expire, password_reset_token,
            password_reset_expire, last_login, login_count, registration_ip,
            suspended_until, suspension_reason, address, preferences
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23)
        RETURNING {USER_COLUMNS}
        "
    );

    sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.phone)
        .bind(&user.profile_photo)
        .bind(user.user_type())
        .bind(learner_profile)
        .bind(instructor_profile)
        .bind(user.status.is_active)
        .bind(user.status.is_email_verified)
        .bind(&user.status.email_verification_token)
        .bind(user.status.email_verification_expire)
        .bind(&user.status.password_reset_token)
        .bind(user.status.password_reset_expire)
        .bind(user.status.last_login)
        .bind(user.status.login_count)
        .bind(&user.status.registration_ip)
        .bind(user.status.suspended_until)
        .bind(&user.status.suspension_reason)
        .bind(Json(&user.address))
        .bind(Json(&user.preferences))
        .fetch_one(pool)
        .await
        .map_err(db_error!("insert_user", user_id = %user.id))
}

/// Overwrite a user's stored fields.
///
/// `password_hash` of `None` keeps the stored hash. `user_type` and
/// `created_at` are never rewritten. Returns `None` if the id is unknown.
pub async fn update_user(
    pool: &PgPool,
    user: &UserRecord,
    password_hash: Option<&str>,
) -> sqlx::Result<Option<UserRow>> {
    let (learner_profile, instructor_profile) = profile_columns(&user.role);
    let sql = format!(
        r"
        UPDATE users SET
            first_name = $2,
            last_name = $3,
            email = $4,
            password_hash = COALESCE($5, password_hash),
            phone = $6,
            profile_photo = $7,
            learner_profile = $8,
            instructor_profile = $9,
            is_active = $10,
            is_email_verified = $11,
            email_verification_token = $12,
            email_verification_expire = $13,
            password_reset_token = $14,
            password_reset_expire = $15,
            last_login = $16,
            login_count = $17,
            registration_ip = $18,
            suspended_until = $19,
            suspension_reason = $20,
            address = $21,
            preferences = $22,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    );

    sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.phone)
        .bind(&user.profile_photo)
        .bind(learner_profile)
        .bind(instructor_profile)
        .bind(user.status.is_active)
        .bind(user.status.is_email_verified)
        .bind(&user.status.email_verification_token)
        .bind(user.status.email_verification_expire)
        .bind(&user.status.password_reset_token)
        .bind(user.status.password_reset_expire)
        .bind(user.status.last_login)
        .bind(user.status.login_count)
        .bind(&user.status.registration_ip)
        .bind(user.status.suspended_until)
        .bind(&user.status.suspension_reason)
        .bind(Json(&user.address))
        .bind(Json(&user.preferences))
        .fetch_optional(pool)
        .await
        .map_err(db_error!("update_user", user_id = %user.id))
}

// ============================================================================
// Reads
// ============================================================================

/// Find user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))
}

/// Find user by (already normalized) email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_email", email = %email))
}

/// Find user by email, including the password hash.
pub async fn find_credentials_by_email(
    pool: &PgPool,
    email: &str,
) -> sqlx::Result<Option<CredentialsRow>> {
    sqlx::query_as::<_, CredentialsRow>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_credentials_by_email", email = %email))
}

/// List users with the given role, oldest first.
pub async fn find_users_by_type(
    pool: &PgPool,
    user_type: UserType,
) -> sqlx::Result<Vec<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE user_type = $1 ORDER BY created_at, id"
    ))
    .bind(user_type)
    .fetch_all(pool)
    .await
    .map_err(db_error!("find_users_by_type", user_type = %user_type))
}

/// List active users, oldest first.
pub async fn find_active_users(pool: &PgPool) -> sqlx::Result<Vec<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_active = TRUE ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await
    .map_err(db_error!("find_active_users", active = true))
}

/// Count users per role. Roles without users are omitted.
pub async fn count_users_by_type(pool: &PgPool) -> sqlx::Result<Vec<(UserType, i64)>> {
    sqlx::query_as::<_, (UserType, i64)>(
        "SELECT user_type, COUNT(*) FROM users GROUP BY user_type ORDER BY user_type",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error!("count_users_by_type", grouped = true))
}
