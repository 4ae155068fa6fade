//! User Service
//!
//! Built once per process and passed by reference to request handlers.
//! Every write flows validate -> apply -> [`prepare_for_write`] -> repository.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::error::{UserError, UserResult, ValidationReport};
use super::password::PasswordHasher;
use super::prepare::{prepare_for_write, PasswordChange};
use super::repository::UserRepository;
use super::types::{CourseId, InstructorProfile, LearnerProfile, UserRecord, UserType};
use super::validation::{apply_update, normalize_email, validate_new_user, NewUser, ProfileUpdate};

/// User record operations over a repository and a password hasher.
#[derive(Debug)]
pub struct UserService<R, H> {
    repo: R,
    hasher: H,
}

impl<R: UserRepository, H: PasswordHasher> UserService<R, H> {
    pub const fn new(repo: R, hasher: H) -> Self {
        Self { repo, hasher }
    }

    pub const fn repository(&self) -> &R {
        &self.repo
    }

    // ========================================================================
    // Registration & profile
    // ========================================================================

    /// Validate, hash and insert a new user.
    #[instrument(skip(self, input), fields(email = ?input.email))]
    pub async fn register(
        &self,
        input: NewUser,
        registration_ip: Option<String>,
    ) -> UserResult<UserRecord> {
        let (mut record, password) = validate_new_user(input)?;
        record.status.registration_ip = registration_ip;

        let prepared = prepare_for_write(&self.hasher, record, password).await?;
        let user = self.repo.insert(prepared).await?;

        info!(user_id = %user.id, user_type = %user.user_type(), "User registered");
        Ok(user)
    }

    /// Apply a partial update. The hasher runs only if the update carries a password.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> UserResult<UserRecord> {
        let mut record = self.load(id).await?;
        let password = apply_update(&mut record, update)?;
        let changed = password.is_changed();

        let prepared = prepare_for_write(&self.hasher, record, password).await?;
        let user = self.repo.update(prepared).await?;

        info!(user_id = %id, password_changed = changed, "User profile updated");
        Ok(user)
    }

    #[instrument(skip(self, new_password))]
    pub async fn change_password(&self, id: Uuid, new_password: String) -> UserResult<UserRecord> {
        self.update_profile(id, ProfileUpdate::password(new_password))
            .await
    }

    /// Check credentials and record the login.
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    #[instrument(skip(self, email, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> UserResult<UserRecord> {
        let email = normalize_email(email);
        let Some(creds) = self.repo.find_credentials_by_email(&email).await? else {
            return Err(UserError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &creds.password_hash).await? {
            warn!(user_id = %creds.user.id, "Password verification failed");
            return Err(UserError::InvalidCredentials);
        }

        let now = Utc::now();
        let mut user = creds.user;
        if !user.can_sign_in(now) {
            warn!(user_id = %user.id, "Sign-in refused for disabled account");
            return Err(UserError::AccountDisabled);
        }

        user.record_login(now);
        self.save(user).await
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub async fn find_by_id(&self, id: Uuid) -> UserResult<Option<UserRecord>> {
        self.repo.find_by_id(id).await
    }

    /// Lookup by email, case and surrounding whitespace ignored.
    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<UserRecord>> {
        self.repo.find_by_email(&normalize_email(email)).await
    }

    pub async fn list_by_type(&self, user_type: UserType) -> UserResult<Vec<UserRecord>> {
        self.repo.find_by_type(user_type).await
    }

    pub async fn list_active(&self) -> UserResult<Vec<UserRecord>> {
        self.repo.find_active().await
    }

    /// Record count per role.
    pub async fn census(&self) -> UserResult<Vec<(UserType, i64)>> {
        self.repo.count_by_type().await
    }

    // ========================================================================
    // Administrative actions
    // ========================================================================

    #[instrument(skip(self, reason))]
    pub async fn suspend(
        &self,
        id: Uuid,
        until: DateTime<Utc>,
        reason: Option<String>,
    ) -> UserResult<UserRecord> {
        let user = self
            .modify(id, |user| {
                user.suspend(until, reason);
                Ok(())
            })
            .await?;
        info!(user_id = %id, %until, "User suspended");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn reactivate(&self, id: Uuid) -> UserResult<UserRecord> {
        self.modify(id, |user| {
            user.reactivate();
            Ok(())
        })
        .await
    }

    /// Soft-delete: the record stays but can no longer sign in.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> UserResult<UserRecord> {
        self.modify(id, |user| {
            user.status.is_active = false;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn verify_email(&self, id: Uuid) -> UserResult<UserRecord> {
        self.modify(id, |user| {
            user.mark_email_verified();
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn verify_instructor(&self, id: Uuid) -> UserResult<UserRecord> {
        self.modify_instructor(id, |profile| {
            profile.verify(Utc::now());
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Learner actions
    // ========================================================================

    pub async fn enroll(&self, id: Uuid, course_id: CourseId) -> UserResult<UserRecord> {
        self.modify_learner(id, |profile| {
            profile.enroll(course_id);
            Ok(())
        })
        .await
    }

    /// Record progress; percentages outside `[0, 100]` are rejected.
    pub async fn record_progress(
        &self,
        id: Uuid,
        course_id: CourseId,
        percentage: f64,
    ) -> UserResult<UserRecord> {
        self.modify_learner(id, |profile| {
            profile
                .record_progress(course_id, percentage, Utc::now())
                .map_err(|e| ValidationReport::single("learnerProfile.progress", e).into())
        })
        .await
    }

    pub async fn complete_course(&self, id: Uuid, course_id: CourseId) -> UserResult<UserRecord> {
        self.modify_learner(id, |profile| {
            profile.complete_course(course_id, Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn issue_certificate(
        &self,
        id: Uuid,
        course_id: CourseId,
        certificate_url: Option<String>,
    ) -> UserResult<UserRecord> {
        self.modify_learner(id, |profile| {
            profile.issue_certificate(course_id, certificate_url, Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn bookmark(&self, id: Uuid, course_id: CourseId) -> UserResult<UserRecord> {
        self.modify_learner(id, |profile| {
            profile.bookmark(course_id);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Instructor actions
    // ========================================================================

    pub async fn add_created_course(
        &self,
        id: Uuid,
        course_id: CourseId,
    ) -> UserResult<UserRecord> {
        self.modify_instructor(id, |profile| {
            profile.add_created_course(course_id);
            Ok(())
        })
        .await
    }

    pub async fn publish_course(&self, id: Uuid, course_id: CourseId) -> UserResult<UserRecord> {
        self.modify_instructor(id, |profile| {
            profile
                .publish_course(course_id)
                .map(|_| ())
                .map_err(|e| ValidationReport::single("instructorProfile.publishedCourses", e).into())
        })
        .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load(&self, id: Uuid) -> UserResult<UserRecord> {
        self.repo.find_by_id(id).await?.ok_or(UserError::NotFound)
    }

    /// Write a record whose password did not change.
    async fn save(&self, record: UserRecord) -> UserResult<UserRecord> {
        let prepared = prepare_for_write(&self.hasher, record, PasswordChange::Unchanged).await?;
        self.repo.update(prepared).await
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> UserResult<UserRecord>
    where
        F: FnOnce(&mut UserRecord) -> UserResult<()>,
    {
        let mut record = self.load(id).await?;
        change(&mut record)?;
        self.save(record).await
    }

    async fn modify_learner<F>(&self, id: Uuid, change: F) -> UserResult<UserRecord>
    where
        F: FnOnce(&mut LearnerProfile) -> UserResult<()>,
    {
        self.modify(id, |user| {
            let profile = user.learner_profile_mut().ok_or(UserError::WrongRole {
                expected: UserType::Learner,
            })?;
            change(profile)
        })
        .await
    }

    async fn modify_instructor<F>(&self, id: Uuid, change: F) -> UserResult<UserRecord>
    where
        F: FnOnce(&mut InstructorProfile) -> UserResult<()>,
    {
        self.modify(id, |user| {
            let profile = user.instructor_profile_mut().ok_or(UserError::WrongRole {
                expected: UserType::Instructor,
            })?;
            change(profile)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::users::error::FieldError;
    use crate::users::prepare::test_support::RecordingHasher;
    use crate::users::repository::MemoryUserRepository;

    type TestService = UserService<MemoryUserRepository, RecordingHasher>;

    fn service() -> TestService {
        UserService::new(MemoryUserRepository::new(), RecordingHasher::default())
    }

    fn ada() -> NewUser {
        NewUser::new("Ada", "Lovelace", "Ada@Example.com", "secret1", "learner")
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let svc = service();
        let user = svc.register(ada(), Some("10.0.0.1".into())).await.unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name(), "Ada Lovelace");
        assert_eq!(user.status.registration_ip.as_deref(), Some("10.0.0.1"));

        let stored = svc.repository().stored_password_hash(user.id).await.unwrap();
        assert_ne!(stored, "secret1");
        assert_eq!(svc.hasher.calls(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_differing_case() {
        let svc = service();
        svc.register(ada(), None).await.unwrap();

        let again = NewUser::new("Ada", "King", "ADA@example.com ", "secret2", "admin");
        let result = svc.register(again, None).await;

        assert!(matches!(
            result,
            Err(UserError::DuplicateKey { field: "email" })
        ));
    }

    #[tokio::test]
    async fn test_register_invalid_does_not_hash() {
        let svc = service();
        let mut input = ada();
        input.user_type = Some("guest".into());

        let result = svc.register(input, None).await;

        assert!(matches!(result, Err(UserError::Invalid(_))));
        assert_eq!(svc.hasher.calls(), 0);
    }

    #[tokio::test]
    async fn test_hash_failure_persists_nothing() {
        let svc = UserService::new(
            MemoryUserRepository::new(),
            RecordingHasher {
                fail: true,
                ..Default::default()
            },
        );

        let result = svc.register(ada(), None).await;

        assert!(matches!(result, Err(UserError::Hashing(_))));
        assert!(svc.find_by_email("ada@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_update_skips_hashing() {
        let svc = service();
        let user = svc.register(ada(), None).await.unwrap();
        let hash_before = svc.repository().stored_password_hash(user.id).await;

        let update = ProfileUpdate {
            last_name: Some("King".into()),
            ..Default::default()
        };
        let updated = svc.update_profile(user.id, update).await.unwrap();

        assert_eq!(updated.full_name(), "Ada King");
        assert_eq!(svc.hasher.calls(), 1);
        assert_eq!(svc.repository().stored_password_hash(user.id).await, hash_before);
    }

    #[tokio::test]
    async fn test_change_password() {
        let svc = service();
        let user = svc.register(ada(), None).await.unwrap();

        svc.change_password(user.id, "newsecret".into()).await.unwrap();

        let stored = svc.repository().stored_password_hash(user.id).await.unwrap();
        assert_eq!(stored, "hashed:newsecret");
        assert_eq!(svc.hasher.calls(), 2);

        let short = svc.change_password(user.id, "123".into()).await;
        assert!(matches!(short, Err(UserError::Invalid(_))));
        assert_eq!(svc.hasher.calls(), 2);
    }

    #[tokio::test]
    async fn test_authenticate_records_login() {
        let svc = service();
        svc.register(ada(), None).await.unwrap();

        let user = svc.authenticate(" ADA@example.com", "secret1").await.unwrap();
        assert_eq!(user.status.login_count, 1);
        assert!(user.status.last_login.is_some());

        let wrong = svc.authenticate("ada@example.com", "nope").await;
        assert!(matches!(wrong, Err(UserError::InvalidCredentials)));

        let unknown = svc.authenticate("who@example.com", "secret1").await;
        assert!(matches!(unknown, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_suspended_and_inactive_cannot_sign_in() {
        let svc = service();
        let user = svc.register(ada(), None).await.unwrap();

        svc.suspend(user.id, Utc::now() + Duration::days(1), Some("abuse".into()))
            .await
            .unwrap();
        let result = svc.authenticate("ada@example.com", "secret1").await;
        assert!(matches!(result, Err(UserError::AccountDisabled)));

        svc.reactivate(user.id).await.unwrap();
        svc.authenticate("ada@example.com", "secret1").await.unwrap();

        svc.deactivate(user.id).await.unwrap();
        let result = svc.authenticate("ada@example.com", "secret1").await;
        assert!(matches!(result, Err(UserError::AccountDisabled)));
        assert!(svc.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_learner_progress_flow() {
        let svc = service();
        let user = svc.register(ada(), None).await.unwrap();
        let course = Uuid::now_v7();

        svc.enroll(user.id, course).await.unwrap();
        svc.record_progress(user.id, course, 60.0).await.unwrap();

        let err = svc.record_progress(user.id, course, 150.0).await.unwrap_err();
        let UserError::Invalid(report) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(
            report.get("learnerProfile.progress"),
            Some(&FieldError::Range {
                field: "progressPercentage".into(),
                min: 0.0,
                max: 100.0,
            })
        );

        svc.complete_course(user.id, course).await.unwrap();
        let done = svc
            .issue_certificate(user.id, course, Some("https://certs.example.com/1".into()))
            .await
            .unwrap();
        let profile = done.learner_profile().unwrap();
        assert_eq!(profile.completed_courses, vec![course]);
        assert!(profile.enrolled_courses.is_empty());
        assert_eq!(profile.certificates.len(), 1);
    }

    #[tokio::test]
    async fn test_role_specific_actions_check_role() {
        let svc = service();
        let learner = svc.register(ada(), None).await.unwrap();
        let instructor = svc
            .register(
                NewUser::new("Grace", "Hopper", "grace@example.com", "cobol59", "instructor"),
                None,
            )
            .await
            .unwrap();
        let course = Uuid::now_v7();

        let result = svc.verify_instructor(learner.id).await;
        assert!(matches!(
            result,
            Err(UserError::WrongRole {
                expected: UserType::Instructor
            })
        ));
        let result = svc.bookmark(instructor.id, course).await;
        assert!(matches!(
            result,
            Err(UserError::WrongRole {
                expected: UserType::Learner
            })
        ));

        svc.add_created_course(instructor.id, course).await.unwrap();
        svc.publish_course(instructor.id, course).await.unwrap();
        let verified = svc.verify_instructor(instructor.id).await.unwrap();
        let profile = verified.instructor_profile().unwrap();
        assert!(profile.is_verified);
        assert!(profile.verification_date.is_some());
        assert_eq!(profile.published_courses, vec![course]);
    }

    #[tokio::test]
    async fn test_lookups_and_census() {
        let svc = service();
        svc.register(ada(), None).await.unwrap();
        svc.register(
            NewUser::new("Root", "User", "root@example.com", "toor123", "admin"),
            None,
        )
        .await
        .unwrap();

        assert!(svc.find_by_email("ADA@EXAMPLE.COM").await.unwrap().is_some());
        assert_eq!(svc.list_by_type(UserType::Admin).await.unwrap().len(), 1);
        assert_eq!(
            svc.census().await.unwrap(),
            vec![(UserType::Learner, 1), (UserType::Admin, 1)]
        );
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let svc = service();
        let result = svc.deactivate(Uuid::now_v7()).await;
        assert!(matches!(result, Err(UserError::NotFound)));
    }
}
