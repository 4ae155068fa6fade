//! User Records
//!
//! Learners, instructors and admins of the platform: validation of incoming
//! data, password hashing ahead of each write, and persistence behind the
//! [`UserRepository`] trait.

mod error;
mod password;
mod prepare;
mod repository;
mod service;
mod types;
mod validation;

pub use error::{FieldError, FieldIssue, UserError, UserResult, ValidationReport};
pub use password::{hash_password, verify_password, Argon2Hasher, HashError, PasswordHasher};
pub use prepare::{prepare_for_write, PasswordChange, PreparedWrite};
pub use repository::{Credentials, MemoryUserRepository, PgUserRepository, UserRepository};
pub use service::UserService;
pub use types::{
    AccountStatus, Address, BankAccount, Certificate, CourseId, CourseProgress, InstructorProfile,
    LearnerProfile, Preferences, Qualification, SocialLinks, Theme, UnknownVariant, UserRecord,
    UserRole, UserType, INSTRUCTOR_BIO_MAX_LEN, LEARNER_BIO_MAX_LEN, NAME_MAX_LEN,
    PASSWORD_MIN_LEN, PROGRESS_RANGE, RATING_RANGE,
};
pub use validation::{
    apply_update, normalize_email, validate_new_user, InstructorProfileUpdate,
    LearnerProfileUpdate, NewUser, PreferencesInput, ProfileUpdate,
};
