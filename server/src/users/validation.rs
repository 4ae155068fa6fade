//! Candidate validation and normalization.
//!
//! Input arrives with every field optional so that absent values are
//! reported as `MissingField` instead of failing deserialization. Values are
//! normalized first (trim, lowercase email), then checked with `validator`,
//! and the resulting report is translated into [`FieldError`]s with camelCase
//! paths. All problems are reported at once.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::error::{FieldError, ValidationReport};
use super::prepare::PasswordChange;
use super::types::{
    AccountStatus, Address, BankAccount, InstructorProfile, LearnerProfile, Preferences,
    Qualification, SocialLinks, Theme, UserRecord, UserRole, UserType,
};

static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    // ASCII word characters only
    regex::Regex::new(r"(?-u)^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("valid regex")
});

// ============================================================================
// Input types
// ============================================================================

/// Registration input.
#[derive(Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(required, length(max = 50))]
    pub first_name: Option<String>,
    #[validate(required, length(max = 50))]
    pub last_name: Option<String>,
    #[validate(required, custom(function = "validate_email_format"))]
    pub email: Option<String>,
    #[validate(required, length(min = 6))]
    pub password: Option<String>,
    #[validate(required, custom(function = "validate_user_type"))]
    pub user_type: Option<String>,
    pub phone: Option<String>,
    pub profile_photo: Option<String>,
    #[validate(nested)]
    pub learner_profile: Option<LearnerProfile>,
    #[validate(nested)]
    pub instructor_profile: Option<InstructorProfile>,
    pub address: Option<Address>,
    #[validate(nested)]
    pub preferences: Option<PreferencesInput>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("user_type", &self.user_type)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    /// Minimal registration input.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        user_type: impl Into<String>,
    ) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            user_type: Some(user_type.into()),
            ..Default::default()
        }
    }

    fn normalize(&mut self) {
        trim_or_clear(&mut self.first_name);
        trim_or_clear(&mut self.last_name);
        trim_or_clear(&mut self.phone);
        trim_or_clear(&mut self.profile_photo);
        if self.password.as_deref().is_some_and(str::is_empty) {
            self.password = None;
        }
        self.email = self
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty());
        if let Some(profile) = self.learner_profile.as_mut() {
            normalize_learner(profile);
        }
        if let Some(profile) = self.instructor_profile.as_mut() {
            trim_list(&mut profile.expertise);
        }
    }
}

/// Preference values as supplied by a client. Absent values keep their defaults.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesInput {
    pub notifications: Option<bool>,
    pub newsletter: Option<bool>,
    pub language: Option<String>,
    #[validate(custom(function = "validate_theme"))]
    pub theme: Option<String>,
}

impl PreferencesInput {
    fn apply_to(self, prefs: &mut Preferences) {
        if let Some(notifications) = self.notifications {
            prefs.notifications = notifications;
        }
        if let Some(newsletter) = self.newsletter {
            prefs.newsletter = newsletter;
        }
        if let Some(language) = self.language {
            prefs.language = language.trim().to_string();
        }
        if let Some(theme) = self.theme.and_then(|t| t.parse::<Theme>().ok()) {
            prefs.theme = theme;
        }
    }
}

/// Editable learner fields. Enrollment and progress change through their own operations.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfileUpdate {
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub learning_goals: Option<Vec<String>>,
}

/// Editable instructor fields. Course lists and counters are not client-writable.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InstructorProfileUpdate {
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub expertise: Option<Vec<String>>,
    pub qualifications: Option<Vec<Qualification>>,
    pub social_links: Option<SocialLinks>,
    pub bank_account: Option<BankAccount>,
}

/// Partial update of an existing record. `None` leaves a field unchanged.
#[derive(Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_email_format"))]
    pub email: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
    /// An empty string clears the phone number.
    pub phone: Option<String>,
    pub profile_photo: Option<String>,
    #[validate(nested)]
    pub learner_profile: Option<LearnerProfileUpdate>,
    #[validate(nested)]
    pub instructor_profile: Option<InstructorProfileUpdate>,
    pub address: Option<Address>,
    #[validate(nested)]
    pub preferences: Option<PreferencesInput>,
}

impl fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password_changed", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

impl ProfileUpdate {
    /// Update that only replaces the password.
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    fn normalize(&mut self) {
        for name in [&mut self.first_name, &mut self.last_name] {
            if let Some(value) = name.as_mut() {
                *value = value.trim().to_string();
            }
        }
        if let Some(phone) = self.phone.as_mut() {
            *phone = phone.trim().to_string();
        }
        self.email = self.email.as_deref().map(normalize_email);
        if let Some(profile) = self.learner_profile.as_mut() {
            if let Some(skills) = profile.skills.as_mut() {
                trim_list(skills);
            }
            if let Some(goals) = profile.learning_goals.as_mut() {
                trim_list(goals);
            }
        }
        if let Some(expertise) = self
            .instructor_profile
            .as_mut()
            .and_then(|p| p.expertise.as_mut())
        {
            trim_list(expertise);
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Trim and lowercase an email address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize and validate registration input into a new record.
///
/// The returned record has a fresh id and creation timestamps; the password
/// is handed back separately for the prepare-for-write step.
pub fn validate_new_user(
    mut input: NewUser,
) -> Result<(UserRecord, PasswordChange), ValidationReport> {
    input.normalize();

    let mut report = report_from(input.validate());
    let user_type = input
        .user_type
        .as_deref()
        .and_then(|t| t.parse::<UserType>().ok());
    if let Some(user_type) = user_type {
        check_profile_blocks(
            user_type,
            input.learner_profile.is_some(),
            input.instructor_profile.is_some(),
            &mut report,
        );
    }

    let NewUser {
        first_name: Some(first_name),
        last_name: Some(last_name),
        email: Some(email),
        password: Some(password),
        phone,
        profile_photo,
        learner_profile,
        instructor_profile,
        address,
        preferences,
        ..
    } = input
    else {
        return Err(report);
    };
    let Some(user_type) = user_type else {
        return Err(report);
    };
    if !report.is_empty() {
        return Err(report);
    }

    let role = match user_type {
        UserType::Learner => UserRole::Learner {
            learner_profile: learner_profile.unwrap_or_default(),
        },
        UserType::Instructor => UserRole::Instructor {
            instructor_profile: instructor_profile.unwrap_or_default(),
        },
        UserType::Admin => UserRole::Admin,
    };

    let mut prefs = Preferences::default();
    if let Some(input) = preferences {
        input.apply_to(&mut prefs);
    }

    let now = Utc::now();
    let record = UserRecord {
        id: Uuid::now_v7(),
        first_name,
        last_name,
        email,
        phone,
        profile_photo,
        role,
        status: AccountStatus::default(),
        address: address.unwrap_or_default(),
        preferences: prefs,
        created_at: now,
        updated_at: now,
    };

    Ok((record, PasswordChange::changed(password)))
}

/// Normalize, validate and apply a partial update in place.
///
/// The record is left untouched when validation fails.
pub fn apply_update(
    record: &mut UserRecord,
    mut update: ProfileUpdate,
) -> Result<PasswordChange, ValidationReport> {
    update.normalize();

    let mut report = report_from(update.validate());
    check_profile_blocks(
        record.user_type(),
        update.learner_profile.is_some(),
        update.instructor_profile.is_some(),
        &mut report,
    );
    if !report.is_empty() {
        return Err(report);
    }

    if let Some(first_name) = update.first_name {
        record.first_name = first_name;
    }
    if let Some(last_name) = update.last_name {
        record.last_name = last_name;
    }
    if let Some(email) = update.email {
        record.email = email;
    }
    if let Some(phone) = update.phone {
        record.phone = Some(phone).filter(|p| !p.is_empty());
    }
    if let Some(photo) = update.profile_photo {
        record.profile_photo = Some(photo).filter(|p| !p.is_empty());
    }
    if let Some(address) = update.address {
        record.address = address;
    }
    if let Some(prefs) = update.preferences {
        prefs.apply_to(&mut record.preferences);
    }

    if let (Some(patch), Some(profile)) = (update.learner_profile, record.learner_profile_mut()) {
        if patch.bio.is_some() {
            profile.bio = patch.bio;
        }
        if let Some(skills) = patch.skills {
            profile.skills = skills;
        }
        if let Some(goals) = patch.learning_goals {
            profile.learning_goals = goals;
        }
    }
    if let (Some(patch), Some(profile)) =
        (update.instructor_profile, record.instructor_profile_mut())
    {
        if patch.bio.is_some() {
            profile.bio = patch.bio;
        }
        if let Some(expertise) = patch.expertise {
            profile.expertise = expertise;
        }
        if let Some(qualifications) = patch.qualifications {
            profile.qualifications = qualifications;
        }
        if let Some(links) = patch.social_links {
            profile.social_links = links;
        }
        if patch.bank_account.is_some() {
            profile.bank_account = patch.bank_account;
        }
    }

    Ok(update
        .password
        .map_or(PasswordChange::Unchanged, PasswordChange::changed))
}

// ============================================================================
// Custom validators
// ============================================================================

fn validate_email_format(email: &str) -> Result<(), ValidationError> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message(Cow::Borrowed("is not a valid email address")))
    }
}

fn validate_user_type(value: &str) -> Result<(), ValidationError> {
    validate_enum::<UserType>(value, &UserType::ALLOWED)
}

fn validate_theme(value: &str) -> Result<(), ValidationError> {
    validate_enum::<Theme>(value, &Theme::ALLOWED)
}

fn validate_enum<T: std::str::FromStr>(
    value: &str,
    allowed: &[&'static str],
) -> Result<(), ValidationError> {
    if value.parse::<T>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("enum");
    err.add_param(Cow::Borrowed("allowed"), &allowed);
    Err(err)
}

// ============================================================================
// Normalization helpers
// ============================================================================

fn trim_or_clear(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

fn trim_list(values: &mut Vec<String>) {
    for value in values.iter_mut() {
        *value = value.trim().to_string();
    }
    values.retain(|v| !v.is_empty());
}

fn normalize_learner(profile: &mut LearnerProfile) {
    trim_list(&mut profile.skills);
    trim_list(&mut profile.learning_goals);
}

/// Reject a profile block that does not belong to the role.
fn check_profile_blocks(
    user_type: UserType,
    has_learner: bool,
    has_instructor: bool,
    report: &mut ValidationReport,
) {
    if has_learner && user_type != UserType::Learner {
        report.push(
            "learnerProfile",
            FieldError::Validation {
                field: "learnerProfile".into(),
                reason: "is only allowed on learner accounts".into(),
            },
        );
    }
    if has_instructor && user_type != UserType::Instructor {
        report.push(
            "instructorProfile",
            FieldError::Validation {
                field: "instructorProfile".into(),
                reason: "is only allowed on instructor accounts".into(),
            },
        );
    }
}

// ============================================================================
// Report translation
// ============================================================================

fn report_from(result: Result<(), ValidationErrors>) -> ValidationReport {
    let mut report = ValidationReport::default();
    if let Err(errors) = result {
        collect(&errors, "", &mut report);
        report.sort();
    }
    report
}

fn collect(errors: &ValidationErrors, prefix: &str, report: &mut ValidationReport) {
    for (field, kind) in errors.errors() {
        let name = camel_case(field);
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    report.push(path.clone(), field_error(&name, err));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, report),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]"), report);
                }
            }
        }
    }
}

fn field_error(field: &str, err: &ValidationError) -> FieldError {
    let field = field.to_string();
    let param = |name: &str| err.params.get(name).and_then(serde_json::Value::as_f64);

    match err.code.as_ref() {
        "required" => FieldError::MissingField { field },
        "range" => FieldError::Range {
            field,
            min: param("min").unwrap_or(f64::NEG_INFINITY),
            max: param("max").unwrap_or(f64::INFINITY),
        },
        "enum" => FieldError::InvalidEnum {
            field,
            allowed: err
                .params
                .get("allowed")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        },
        "length" => FieldError::Validation {
            field,
            reason: length_reason(param("min"), param("max")),
        },
        code => FieldError::Validation {
            field,
            reason: err
                .message
                .as_deref()
                .map_or_else(|| format!("failed {code} check"), str::to_string),
        },
    }
}

fn length_reason(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) if min >= 1.0 => {
            format!("must be between {min} and {max} characters")
        }
        (_, Some(max)) => format!("cannot exceed {max} characters"),
        (Some(min), None) => format!("must be at least {min} characters"),
        (None, None) => "has an invalid length".to_string(),
    }
}

/// `learner_profile` -> `learnerProfile`.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}
