//! Database Models

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::users::{
    AccountStatus, Address, InstructorProfile, LearnerProfile, Preferences, UserRecord, UserRole,
    UserType,
};

/// Row of the `users` table without the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_photo: Option<String>,
    pub user_type: UserType,
    pub learner_profile: Option<Json<LearnerProfile>>,
    pub instructor_profile: Option<Json<InstructorProfile>>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_expire: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expire: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub registration_ip: Option<String>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub address: Json<Address>,
    pub preferences: Json<Preferences>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row selected by the credentials lookup.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialsRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub password_hash: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        // A missing profile column for the row's role reads as an empty profile.
        let role = match row.user_type {
            UserType::Learner => UserRole::Learner {
                learner_profile: row.learner_profile.map(|p| p.0).unwrap_or_default(),
            },
            UserType::Instructor => UserRole::Instructor {
                instructor_profile: row.instructor_profile.map(|p| p.0).unwrap_or_default(),
            },
            UserType::Admin => UserRole::Admin,
        };

        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            profile_photo: row.profile_photo,
            role,
            status: AccountStatus {
                is_active: row.is_active,
                is_email_verified: row.is_email_verified,
                email_verification_token: row.email_verification_token,
                email_verification_expire: row.email_verification_expire,
                password_reset_token: row.password_reset_token,
                password_reset_expire: row.password_reset_expire,
                last_login: row.last_login,
                login_count: row.login_count,
                registration_ip: row.registration_ip,
                suspended_until: row.suspended_until,
                suspension_reason: row.suspension_reason,
            },
            address: row.address.0,
            preferences: row.preferences.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Profile columns for a record: at most one is set, matching the role.
pub(crate) fn profile_columns(
    role: &UserRole,
) -> (Option<Json<&LearnerProfile>>, Option<Json<&InstructorProfile>>) {
    match role {
        UserRole::Learner { learner_profile } => (Some(Json(learner_profile)), None),
        UserRole::Instructor { instructor_profile } => (None, Some(Json(instructor_profile))),
        UserRole::Admin => (None, None),
    }
}
