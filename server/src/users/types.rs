//! User Record Types
//!
//! The persisted shape of a platform user. Role-specific data lives in
//! [`UserRole`], so a record only ever carries the profile block that
//! matches its `userType`.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::error::FieldError;

/// Reference to a course stored in another collection.
pub type CourseId = Uuid;

/// Maximum length of first and last names.
pub const NAME_MAX_LEN: u64 = 50;
/// Minimum password length accepted at write time.
pub const PASSWORD_MIN_LEN: u64 = 6;
/// Maximum learner bio length.
pub const LEARNER_BIO_MAX_LEN: u64 = 500;
/// Maximum instructor bio length.
pub const INSTRUCTOR_BIO_MAX_LEN: u64 = 1000;
/// Inclusive bounds for rating fields.
pub const RATING_RANGE: (f64, f64) = (0.0, 5.0);
/// Inclusive bounds for course progress.
pub const PROGRESS_RANGE: (f64, f64) = (0.0, 100.0);

/// Value that does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant {0:?}")]
pub struct UnknownVariant(pub String);

// ============================================================================
// Enums
// ============================================================================

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
pub enum UserType {
    Learner,
    Instructor,
    Admin,
}

impl UserType {
    /// Accepted wire values, in declaration order.
    pub const ALLOWED: [&'static str; 3] = ["learner", "instructor", "admin"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learner" => Ok(Self::Learner),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const ALLOWED: [&'static str; 2] = ["light", "dark"];
}

impl FromStr for Theme {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Inclusive bounds check that also rejects NaN and infinities, reported
/// with the `range` code so it surfaces as [`FieldError::Range`].
fn check_bounds(value: f64, (min, max): (f64, f64)) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        return Ok(());
    }
    let mut err = ValidationError::new("range");
    err.add_param(Cow::Borrowed("min"), &min);
    err.add_param(Cow::Borrowed("max"), &max);
    Err(err)
}

fn validate_progress(value: f64) -> Result<(), ValidationError> {
    check_bounds(value, PROGRESS_RANGE)
}

fn validate_rating(value: f64) -> Result<(), ValidationError> {
    check_bounds(value, RATING_RANGE)
}

// ============================================================================
// Learner profile
// ============================================================================

/// Certificate issued for a completed course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub course_id: CourseId,
    pub certificate_url: Option<String>,
    pub issued_date: Option<DateTime<Utc>>,
}

/// Progress through one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: CourseId,
    #[serde(default)]
    #[validate(custom(function = "validate_progress"))]
    pub progress_percentage: f64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Learner-only profile data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProfile {
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub learning_goals: Vec<String>,
    pub enrolled_courses: Vec<CourseId>,
    pub completed_courses: Vec<CourseId>,
    pub certificates: Vec<Certificate>,
    #[validate(nested)]
    pub progress: Vec<CourseProgress>,
    pub bookmarked_courses: Vec<CourseId>,
    pub total_spent_hours: f64,
    #[validate(custom(function = "validate_rating"))]
    pub average_rating: f64,
}

impl LearnerProfile {
    /// Add a course to the enrolled list. Returns `false` if already enrolled.
    pub fn enroll(&mut self, course_id: CourseId) -> bool {
        if self.enrolled_courses.contains(&course_id) {
            return false;
        }
        self.enrolled_courses.push(course_id);
        true
    }

    /// Record progress for a course, enrolling the learner if needed.
    pub fn record_progress(
        &mut self,
        course_id: CourseId,
        percentage: f64,
        at: DateTime<Utc>,
    ) -> Result<(), FieldError> {
        let (min, max) = PROGRESS_RANGE;
        if !(min..=max).contains(&percentage) {
            return Err(FieldError::Range {
                field: "progressPercentage".into(),
                min,
                max,
            });
        }

        if !self.completed_courses.contains(&course_id) {
            self.enroll(course_id);
        }

        match self.progress.iter_mut().find(|p| p.course_id == course_id) {
            Some(entry) => {
                entry.progress_percentage = percentage;
                entry.last_accessed = Some(at);
            }
            None => self.progress.push(CourseProgress {
                course_id,
                progress_percentage: percentage,
                last_accessed: Some(at),
            }),
        }
        Ok(())
    }

    /// Move a course from enrolled to completed and pin its progress at 100%.
    pub fn complete_course(&mut self, course_id: CourseId, at: DateTime<Utc>) {
        self.enrolled_courses.retain(|id| *id != course_id);
        if !self.completed_courses.contains(&course_id) {
            self.completed_courses.push(course_id);
        }
        // Always in range, cannot fail.
        let _ = self.record_progress(course_id, PROGRESS_RANGE.1, at);
    }

    pub fn issue_certificate(
        &mut self,
        course_id: CourseId,
        certificate_url: Option<String>,
        issued_at: DateTime<Utc>,
    ) {
        self.certificates.push(Certificate {
            course_id,
            certificate_url,
            issued_date: Some(issued_at),
        });
    }

    /// Bookmark a course. Returns `false` if it was already bookmarked.
    pub fn bookmark(&mut self, course_id: CourseId) -> bool {
        if self.bookmarked_courses.contains(&course_id) {
            return false;
        }
        self.bookmarked_courses.push(course_id);
        true
    }
}

// ============================================================================
// Instructor profile
// ============================================================================

/// Academic or professional qualification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Qualification {
    pub qualification: Option<String>,
    pub institution: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
}

/// Payout account. Access to this block is restricted by the caller.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankAccount {
    pub account_holder: Option<String>,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub ifsc_code: Option<String>,
}

impl fmt::Debug for BankAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankAccount")
            .field("account_holder", &self.account_holder)
            .field("account_number", &self.account_number.as_ref().map(|_| "[redacted]"))
            .field("bank_name", &self.bank_name)
            .field("ifsc_code", &self.ifsc_code.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Instructor-only profile data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct InstructorProfile {
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub expertise: Vec<String>,
    pub qualifications: Vec<Qualification>,
    pub created_courses: Vec<CourseId>,
    pub published_courses: Vec<CourseId>,
    pub total_students: u64,
    pub total_courses: u64,
    #[validate(custom(function = "validate_rating"))]
    pub average_rating: f64,
    pub social_links: SocialLinks,
    pub bank_account: Option<BankAccount>,
    pub is_verified: bool,
    pub verification_date: Option<DateTime<Utc>>,
}

impl InstructorProfile {
    /// Track a newly authored course. `totalCourses` follows the created list.
    pub fn add_created_course(&mut self, course_id: CourseId) -> bool {
        if self.created_courses.contains(&course_id) {
            return false;
        }
        self.created_courses.push(course_id);
        self.total_courses = self.created_courses.len() as u64;
        true
    }

    /// Mark an authored course as published.
    pub fn publish_course(&mut self, course_id: CourseId) -> Result<bool, FieldError> {
        if !self.created_courses.contains(&course_id) {
            return Err(FieldError::Validation {
                field: "publishedCourses".into(),
                reason: "course was not created by this instructor".into(),
            });
        }
        if self.published_courses.contains(&course_id) {
            return Ok(false);
        }
        self.published_courses.push(course_id);
        Ok(true)
    }

    pub fn verify(&mut self, at: DateTime<Utc>) {
        self.is_verified = true;
        self.verification_date = Some(at);
    }
}

// ============================================================================
// Role
// ============================================================================

/// Role tag plus the profile payload that belongs to it.
///
/// Serialized flat into the record as `userType` alongside
/// `learnerProfile` / `instructorProfile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "userType", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum UserRole {
    Learner { learner_profile: LearnerProfile },
    Instructor { instructor_profile: InstructorProfile },
    Admin,
}

impl UserRole {
    pub const fn user_type(&self) -> UserType {
        match self {
            Self::Learner { .. } => UserType::Learner,
            Self::Instructor { .. } => UserType::Instructor,
            Self::Admin => UserType::Admin,
        }
    }

    /// Role with an empty profile block.
    pub fn empty(user_type: UserType) -> Self {
        match user_type {
            UserType::Learner => Self::Learner {
                learner_profile: LearnerProfile::default(),
            },
            UserType::Instructor => Self::Instructor {
                instructor_profile: InstructorProfile::default(),
            },
            UserType::Admin => Self::Admin,
        }
    }
}

// ============================================================================
// Account status, address, preferences
// ============================================================================

/// Account flags, tokens and login metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verification_token: Option<String>,
    pub email_verification_expire: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    pub password_reset_expire: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub registration_ip: Option<String>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self {
            is_active: true,
            is_email_verified: false,
            email_verification_token: None,
            email_verification_expire: None,
            password_reset_token: None,
            password_reset_expire: None,
            last_login: None,
            login_count: 0,
            registration_ip: None,
            suspended_until: None,
            suspension_reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

/// Notification and display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub notifications: bool,
    pub newsletter: bool,
    pub language: String,
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            newsletter: false,
            language: "en".to_string(),
            theme: Theme::Light,
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// One platform user.
///
/// The password is write-only: it never appears on this type. Writes carry
/// it separately through [`super::PreparedWrite`] and reads that need it go
/// through the credentials lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_photo: Option<String>,
    #[serde(flatten)]
    pub role: UserRole,
    #[serde(flatten)]
    pub status: AccountStatus,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// `firstName + " " + lastName`, computed on every call.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub const fn user_type(&self) -> UserType {
        self.role.user_type()
    }

    pub const fn learner_profile(&self) -> Option<&LearnerProfile> {
        match &self.role {
            UserRole::Learner { learner_profile } => Some(learner_profile),
            _ => None,
        }
    }

    pub fn learner_profile_mut(&mut self) -> Option<&mut LearnerProfile> {
        match &mut self.role {
            UserRole::Learner { learner_profile } => Some(learner_profile),
            _ => None,
        }
    }

    pub const fn instructor_profile(&self) -> Option<&InstructorProfile> {
        match &self.role {
            UserRole::Instructor { instructor_profile } => Some(instructor_profile),
            _ => None,
        }
    }

    pub fn instructor_profile_mut(&mut self) -> Option<&mut InstructorProfile> {
        match &mut self.role {
            UserRole::Instructor { instructor_profile } => Some(instructor_profile),
            _ => None,
        }
    }

    pub fn is_suspended_at(&self, now: DateTime<Utc>) -> bool {
        self.status.suspended_until.is_some_and(|until| until > now)
    }

    /// Active and not inside a suspension window.
    pub fn can_sign_in(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active && !self.is_suspended_at(now)
    }

    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.status.last_login = Some(at);
        self.status.login_count += 1;
    }

    pub fn suspend(&mut self, until: DateTime<Utc>, reason: Option<String>) {
        self.status.suspended_until = Some(until);
        self.status.suspension_reason = reason;
    }

    /// Clear any suspension and mark the account active again.
    pub fn reactivate(&mut self) {
        self.status.is_active = true;
        self.status.suspended_until = None;
        self.status.suspension_reason = None;
    }

    pub fn mark_email_verified(&mut self) {
        self.status.is_email_verified = true;
        self.status.email_verification_token = None;
        self.status.email_verification_expire = None;
    }
}
